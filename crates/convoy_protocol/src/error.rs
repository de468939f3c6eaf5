//! Decode errors for bus payloads.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Protocol operation result type.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding bus payloads.
///
/// A decode failure condemns one message, never the subscription: handlers
/// log the error and move on to the next message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("subject {0:?} does not end in a vehicle id")]
    MissingVehicleId(String),

    #[error("invalid vehicle id {0:?}: {1}")]
    InvalidVehicleId(String, uuid::Error),
}

/// Decode a JSON payload into a wire type.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Encode a wire type as a JSON payload.
///
/// All wire types serialize infallibly; a failure here would be a
/// programming error in the type definitions, so it is surfaced as a
/// `ProtocolError` rather than a panic.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}
