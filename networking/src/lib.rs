//! Transaction gossip for the node.
//!
//! Transaction ids are announced on a broadcast topic and bodies are pulled
//! point-to-point from the peer that relayed the announcement. The gossip
//! tasks in [`tx_gossip`] are written against the [`channel`] traits; the
//! libp2p transport in [`network`] and the in-process transport in [`local`]
//! both implement them.

pub mod bootnodes;
pub mod channel;
pub mod compressor;
pub mod error;
pub mod gossipsub;
pub mod local;
pub mod network;
pub mod req_resp;
pub mod tx_gossip;
pub mod types;

pub use channel::{PeerLink, Subscription, TopicChannel, TopicHandle};
pub use error::{FetchError, GossipError};
pub use types::{ConnectionState, GossipMessage};
