//! Single-slot latest-value register with wait-for-change semantics.

use std::sync::Mutex;

use tokio::sync::watch;

/// A single-slot holder of the latest value of `T`.
///
/// [`put`](AsyncValue::put) overwrites the slot and wakes every current
/// waiter; [`get`](AsyncValue::get) reads the slot and hands back a
/// [`Changed`] handle that completes the next time `put` is called. This
/// is a latch, not a queue: a consumer that gets, waits, and gets again is
/// guaranteed to observe every change event, but intermediate values may
/// collapse into the latest one.
///
/// Internally the slot is paired with a generation counter carried on a
/// `tokio::sync::watch` channel. Both are updated under one lock, so a
/// handle obtained from `get` can never miss a `put` that happens after
/// `get` returns.
pub struct AsyncValue<T> {
    slot: Mutex<T>,
    generation: watch::Sender<u64>,
}

impl<T: Clone> AsyncValue<T> {
    pub fn new(value: T) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            slot: Mutex::new(value),
            generation,
        }
    }

    /// Overwrite the current value and wake all current waiters.
    pub fn put(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = value;
        self.generation.send_modify(|gen| *gen += 1);
    }

    /// Read the current value and obtain a handle onto future changes.
    pub fn get(&self) -> (T, Changed) {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let value = slot.clone();
        // Subscribing while the slot lock is held pins the receiver to the
        // generation the value was read at.
        let receiver = self.generation.subscribe();
        let seen = *receiver.borrow();
        (value, Changed { receiver, seen })
    }
}

/// Completion handle returned by [`AsyncValue::get`].
///
/// [`wait`](Changed::wait) completes once a `put` has happened since the
/// handle was created (or since the previous `wait` on the same handle).
/// Many consumers can hold distinct handles; one `put` releases all of
/// them.
pub struct Changed {
    receiver: watch::Receiver<u64>,
    seen: u64,
}

impl Changed {
    pub async fn wait(&mut self) {
        let seen = self.seen;
        let result = self.receiver.wait_for(|gen| *gen > seen).await.map(|gen| *gen);
        match result {
            Ok(gen) => self.seen = gen,
            // The register was dropped; nothing will ever change again.
            Err(_) => std::future::pending::<()>().await,
        }
    }
}
