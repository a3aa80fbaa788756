mod behaviour;
mod handle;
mod service;

pub use behaviour::{NodeBehaviour, NodeBehaviourEvent};
pub use handle::{NetworkHandle, NetworkSubscription, NetworkTopic};
pub use service::{NetworkService, NetworkServiceConfig};
