use std::fmt;
use std::str::FromStr;

use hex::FromHex;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Length in bytes of a transaction identifier.
pub const TX_ID_LEN: usize = 32;

/// Opaque 32-byte transaction identifier.
///
/// Carried verbatim as the gossip payload. The transaction index keys
/// entries by its lowercase hex encoding (see [`TransactionId::to_key`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(#[serde(with = "crate::serde_helpers::hex_bytes")] pub [u8; TX_ID_LEN]);

impl TransactionId {
    /// Draws a fresh identifier from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; TX_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        TransactionId(bytes)
    }

    /// Parses an identifier from a gossip payload.
    ///
    /// Returns `None` unless `data` is exactly [`TX_ID_LEN`] bytes long.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        <[u8; TX_ID_LEN]>::try_from(data).ok().map(TransactionId)
    }

    pub fn as_bytes(&self) -> &[u8; TX_ID_LEN] {
        &self.0
    }

    /// Human-readable key used by the transaction index.
    pub fn to_key(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for TransactionId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = <[u8; TX_ID_LEN]>::from_hex(s.trim_start_matches("0x"))?;
        Ok(TransactionId(bytes))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", hex::encode(self.0))
    }
}

/// Opaque transaction payload.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionBody(#[serde(with = "crate::serde_helpers::hex_bytes")] pub Vec<u8>);

impl TransactionBody {
    pub fn new(bytes: Vec<u8>) -> Self {
        TransactionBody(bytes)
    }

    /// Random payload standing in for real transaction construction.
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        TransactionBody(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for TransactionBody {
    fn from(bytes: Vec<u8>) -> Self {
        TransactionBody(bytes)
    }
}

impl AsRef<[u8]> for TransactionBody {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TransactionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionBody")
            .field("len", &self.0.len())
            .field("data", &hex::encode(&self.0))
            .finish()
    }
}
