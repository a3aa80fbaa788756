use tracing::warn;

use crate::channel::{TopicChannel, TopicHandle};
use crate::error::GossipError;
use crate::gossipsub::topic::{BLOCK_TOPIC, TX_TOPIC};

/// Joins `name` and opens a subscription on it.
///
/// If subscribing fails the join is released before the error is returned.
pub async fn subscribe_topic<C: TopicChannel>(
    channel: &C,
    name: &str,
) -> Result<(C::Topic, <C::Topic as TopicHandle>::Subscription), GossipError> {
    let topic = channel.join(name).await?;

    match topic.subscribe().await {
        Ok(subscription) => Ok((topic, subscription)),
        Err(err) => {
            if let Err(close_err) = topic.close().await {
                warn!(topic = name, error = %close_err, "Failed to release topic after subscribe error");
            }
            Err(err)
        }
    }
}

pub async fn subscribe_transactions<C: TopicChannel>(
    channel: &C,
) -> Result<(C::Topic, <C::Topic as TopicHandle>::Subscription), GossipError> {
    subscribe_topic(channel, TX_TOPIC).await
}

pub async fn subscribe_blocks<C: TopicChannel>(
    channel: &C,
) -> Result<(C::Topic, <C::Topic as TopicHandle>::Subscription), GossipError> {
    subscribe_topic(channel, BLOCK_TOPIC).await
}
