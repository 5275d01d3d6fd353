use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

use crate::error::CdpError;

pub type WaiterReply = Result<serde_json::Value, CdpError>;

/// Keyed by CDP command id. The reader thread only ever takes this lock for
/// an O(1) lookup-and-remove; it never blocks while holding it.
#[derive(Default)]
pub struct WaiterMap {
    inner: Mutex<HashMap<u64, (String, Sender<WaiterReply>)>>,
}

impl WaiterMap {
    pub fn register(&self, id: u64, method: String, tx: Sender<WaiterReply>) {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(id, (method, tx));
    }

    /// Removes and returns the waiter, if still present. A timed-out call
    /// removes its own waiter before returning, so a late reply finds
    /// nothing here and is silently discarded by the reader thread.
    pub fn take(&self, id: u64) -> Option<(String, Sender<WaiterReply>)> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.remove(&id)
    }

    /// Drains all outstanding waiters with a cancellation error, used when
    /// the transport is closed so nobody blocks forever.
    pub fn cancel_all(&self, reason: &str) {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_id, (method, tx)) in guard.drain() {
            let _ = tx.send(Err(CdpError::Cancelled {
                method,
                reason: reason.to_string(),
            }));
        }
    }
}
