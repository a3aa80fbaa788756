//! Local transaction index.
//!
//! The index maps a transaction id (keyed by its hex encoding) to the
//! transaction body and is the single authority on whether an id has already
//! been processed. Gossip tasks share one index concurrently, so every
//! implementation must be internally synchronized.

pub mod memory;

use std::sync::Arc;

use containers::{TransactionBody, TransactionId};

pub use memory::MemoryIndex;

/// Result of a [`TransactionIndex::store`] call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The id was not present and has been inserted.
    Inserted,
    /// The id was present with an identical body. Nothing changed.
    Unchanged,
    /// The id was present with a different body. The existing body is kept.
    Conflicting,
}

impl StoreOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreOutcome::Conflicting)
    }
}

pub trait TransactionIndex: Send + Sync {
    /// Whether a body for `id` is already stored.
    fn have(&self, id: &TransactionId) -> bool;

    /// Stores `body` under `id`.
    ///
    /// Storing the same pair twice leaves the index unchanged. An id is never
    /// rebound to a different body.
    fn store(&self, id: &TransactionId, body: TransactionBody) -> StoreOutcome;

    /// Body for `id`, used to answer fetch requests from peers.
    fn get(&self, id: &TransactionId) -> Option<TransactionBody>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SharedIndex = Arc<dyn TransactionIndex>;
