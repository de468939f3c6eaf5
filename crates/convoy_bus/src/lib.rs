//! Thin typed wrapper over the NATS connection.
//!
//! Design principles:
//! - One [`Bus`] per process, cloned into every component (the underlying
//!   client is a cheap handle onto a shared connection).
//! - Initial connect retries forever with a fixed 2-second backoff;
//!   reconnects after that are the client's own unlimited retry loop.
//! - Subscriptions are values: dropping a [`Subscription`] unsubscribes,
//!   so scope exit tears the subscription down even on error.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

pub use async_nats::Message;

/// Backoff between initial connection attempts.
const CONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Bus operation result type.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors surfaced by bus operations.
///
/// Transient transport failures (disconnects, timeouts) show up here and
/// are absorbed by the callers' retry wrappers; the connection itself
/// heals in the background.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("publish failed: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("request failed: {0}")]
    Request(#[from] async_nats::RequestError),

    #[error("subscribe failed: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    #[error("flush failed: {0}")]
    Flush(#[from] async_nats::client::FlushError),

    #[error("message on {0:?} has no reply subject")]
    NoReplySubject(String),
}

/// A live subscription; messages arrive through the `Stream` impl.
///
/// Dropping the value unsubscribes.
pub type Subscription = async_nats::Subscriber;

/// Shared handle onto the process-wide NATS connection.
#[derive(Clone)]
pub struct Bus {
    client: async_nats::Client,
}

impl Bus {
    /// Connect to the bus, retrying every 2 seconds until it succeeds.
    pub async fn connect(url: &str) -> Self {
        loop {
            match async_nats::connect(url).await {
                Ok(client) => {
                    info!("connected to nats at {url}");
                    return Self { client };
                }
                Err(e) => {
                    warn!("nats connect to {url} failed, retrying: {e}");
                    tokio::time::sleep(CONNECT_BACKOFF).await;
                }
            }
        }
    }

    /// Wrap an already-connected client (used by tests).
    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }

    /// Publish a payload and flush it to the server.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(subject.to_string(), Bytes::from(payload))
            .await?;
        self.client.flush().await?;
        Ok(())
    }

    /// Send a request and await the reply.
    pub async fn request(&self, subject: &str, payload: Vec<u8>) -> Result<Bytes> {
        let reply = self
            .client
            .request(subject.to_string(), Bytes::from(payload))
            .await?;
        Ok(reply.payload)
    }

    /// Reply to a request message.
    pub async fn respond(&self, request: &Message, payload: Vec<u8>) -> Result<()> {
        let reply = request
            .reply
            .as_ref()
            .ok_or_else(|| BusError::NoReplySubject(request.subject.to_string()))?;
        self.client
            .publish(reply.clone(), Bytes::from(payload))
            .await?;
        self.client.flush().await?;
        Ok(())
    }

    /// Subscribe to a subject; every subscriber receives every message.
    pub async fn subscribe(&self, subject: &str) -> Result<Subscription> {
        Ok(self.client.subscribe(subject.to_string()).await?)
    }

    /// Subscribe as a queue-group member; exactly one member of the group
    /// receives each message.
    pub async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<Subscription> {
        Ok(self
            .client
            .queue_subscribe(subject.to_string(), group.to_string())
            .await?)
    }
}
