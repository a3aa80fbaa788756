use serde::{Deserialize, Serialize};

use crate::types::{TransactionBody, TransactionId};

/// Body size minted by the announcer when no real transaction builder
/// is plugged in.
pub const DEFAULT_BODY_SIZE: usize = 10;

/// An identifier together with the body it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub body: TransactionBody,
}

impl Transaction {
    pub fn new(id: TransactionId, body: TransactionBody) -> Self {
        Self { id, body }
    }

    /// Mints a transaction with a random id and `body_len` random body bytes.
    pub fn random(body_len: usize) -> Self {
        Self {
            id: TransactionId::random(),
            body: TransactionBody::random(body_len),
        }
    }
}
