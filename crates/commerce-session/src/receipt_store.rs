//! Global, append-only receipt-fingerprint table (ch.5 "Shared resources").
//! An intent fingerprint is reserved when a session locks funds at
//! ACCEPT and is released if the session ends in any terminal status
//! other than a committed success — resolving SPEC_FULL open question
//! (c): release on any non-commit terminal, not just explicit failures.

use commerce_core::types::IntentId;
use std::collections::HashSet;
use std::sync::Mutex;

fn fingerprint(intent_id: &IntentId) -> String {
    commerce_crypto::sha256_hex(intent_id.as_str().as_bytes())
}

#[derive(Debug, Default)]
pub struct ReceiptStore {
    committed: Mutex<HashSet<String>>,
    reserved: Mutex<HashSet<String>>,
}

impl ReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the fingerprint for `intent_id`. Returns `false` if a
    /// receipt has already been committed for this intent (double-commit
    /// guard) or a reservation is already outstanding.
    pub fn reserve(&self, intent_id: &IntentId) -> bool {
        let fp = fingerprint(intent_id);
        if self.committed.lock().unwrap().contains(&fp) {
            return false;
        }
        self.reserved.lock().unwrap().insert(fp)
    }

    /// Release a reservation without committing — called when a session
    /// terminates without a settled receipt.
    pub fn release(&self, intent_id: &IntentId) {
        let fp = fingerprint(intent_id);
        self.reserved.lock().unwrap().remove(&fp);
    }

    /// Convert a reservation into a permanent commit. An intent
    /// fingerprint can be committed at most once.
    pub fn commit(&self, intent_id: &IntentId) -> bool {
        let fp = fingerprint(intent_id);
        self.reserved.lock().unwrap().remove(&fp);
        self.committed.lock().unwrap().insert(fp)
    }

    pub fn is_committed(&self, intent_id: &IntentId) -> bool {
        self.committed.lock().unwrap().contains(&fingerprint(intent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_allows_future_reservation() {
        let store = ReceiptStore::new();
        let id = IntentId::from("intent-1");
        assert!(store.reserve(&id));
        store.release(&id);
        assert!(store.reserve(&id));
    }

    #[test]
    fn commit_blocks_any_further_reservation() {
        let store = ReceiptStore::new();
        let id = IntentId::from("intent-1");
        assert!(store.reserve(&id));
        assert!(store.commit(&id));
        assert!(!store.reserve(&id));
    }
}
