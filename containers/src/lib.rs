pub mod serde_helpers;
pub mod transaction;
pub mod types;

pub use transaction::{DEFAULT_BODY_SIZE, Transaction};
pub use types::{TX_ID_LEN, TransactionBody, TransactionId};
