use std::collections::HashMap;
use std::collections::hash_map::Entry;

use containers::{TransactionBody, TransactionId};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::{StoreOutcome, TransactionIndex};

/// In-memory [`TransactionIndex`] guarded by a read-write lock.
///
/// Entries are keyed by the lowercase hex encoding of the id. Nothing is
/// ever evicted.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    txs: RwLock<HashMap<String, TransactionBody>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted keys of every stored transaction.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.txs.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl TransactionIndex for MemoryIndex {
    fn have(&self, id: &TransactionId) -> bool {
        self.txs.read().contains_key(&id.to_key())
    }

    fn store(&self, id: &TransactionId, body: TransactionBody) -> StoreOutcome {
        let key = id.to_key();
        let mut txs = self.txs.write();

        match txs.entry(key) {
            Entry::Vacant(entry) => {
                trace!(tx_id = %id, len = body.len(), "Stored transaction");
                entry.insert(body);
                StoreOutcome::Inserted
            }
            Entry::Occupied(entry) if *entry.get() == body => StoreOutcome::Unchanged,
            Entry::Occupied(entry) => {
                warn!(
                    tx_id = %id,
                    stored_len = entry.get().len(),
                    offered_len = body.len(),
                    "Refusing to rebind transaction id to a different body"
                );
                StoreOutcome::Conflicting
            }
        }
    }

    fn get(&self, id: &TransactionId) -> Option<TransactionBody> {
        self.txs.read().get(&id.to_key()).cloned()
    }

    fn len(&self) -> usize {
        self.txs.read().len()
    }
}
