//! Pending login challenges.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

/// One-shot login challenge tokens, keyed by email.
///
/// At most one challenge is pending per email: `issue` overwrites any
/// earlier token, and a successful login consumes it. Entries for accounts
/// that requested a nonce but never logged in are never swept.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    pending: Mutex<HashMap<String, String>>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh unguessable token for the email, replacing any
    /// previous one.
    pub fn issue(&self, email: &str) -> String {
        let nonce = Uuid::new_v4().to_string();
        self.pending
            .lock()
            .insert(email.to_string(), nonce.clone());
        nonce
    }

    /// Peek at the pending token without consuming it.
    pub fn peek(&self, email: &str) -> Option<String> {
        self.pending.lock().get(email).cloned()
    }

    /// Remove and return the pending token.
    pub fn consume(&self, email: &str) -> Option<String> {
        self.pending.lock().remove(email)
    }

    /// Number of pending challenges (observability only).
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
