use crate::gossipsub::topic::{
    BLOCK_TOPIC, ENCODING_POSTFIX, GossipsubKind, GossipsubTopic, TOPIC_PREFIX, TX_TOPIC,
    get_topics, parse_topic_string,
};
use libp2p::gossipsub::TopicHash;

#[test]
fn test_topic_string_layout() {
    let topic = GossipsubTopic::transactions("devnet0".to_string());
    assert_eq!(topic.to_string(), "/gossipnode/devnet0/txs/snappy");

    let topic = GossipsubTopic::blocks("devnet0".to_string());
    assert_eq!(topic.to_string(), "/gossipnode/devnet0/blks/snappy");
}

#[test]
fn test_topic_decode_valid_transactions() {
    let topic_str = format!("/{TOPIC_PREFIX}/devnet0/{TX_TOPIC}/{ENCODING_POSTFIX}");
    let decoded = GossipsubTopic::decode(&TopicHash::from_raw(topic_str)).unwrap();

    assert_eq!(decoded.network, "devnet0");
    assert_eq!(decoded.kind, GossipsubKind::Transactions);
}

#[test]
fn test_topic_decode_valid_blocks() {
    let topic_str = format!("/{TOPIC_PREFIX}/devnet0/{BLOCK_TOPIC}/{ENCODING_POSTFIX}");
    let decoded = GossipsubTopic::decode(&TopicHash::from_raw(topic_str)).unwrap();

    assert_eq!(decoded.kind, GossipsubKind::Blocks);
}

#[test]
fn test_topic_decode_invalid_parts() {
    assert!(GossipsubTopic::from_string("/invalid/topic").is_err());
    assert!(GossipsubTopic::from_string("/wrongprefix/devnet0/txs/snappy").is_err());
    assert!(GossipsubTopic::from_string("/gossipnode/devnet0/txs/ssz_snappy").is_err());
    assert!(GossipsubTopic::from_string("/gossipnode/devnet0/votes/snappy").is_err());
}

#[test]
fn test_topic_hash_round_trip() {
    let topic = GossipsubTopic::transactions("devnet0".to_string());
    let hash: TopicHash = topic.clone().into();

    assert_eq!(GossipsubTopic::decode(&hash).unwrap(), topic);
}

#[test]
fn test_kind_from_name() {
    assert_eq!(GossipsubKind::from_name("txs"), Some(GossipsubKind::Transactions));
    assert_eq!(GossipsubKind::from_name("blks"), Some(GossipsubKind::Blocks));
    assert_eq!(GossipsubKind::from_name("block"), None);
    assert_eq!(GossipsubKind::Transactions.to_string(), "txs");
}

#[test]
fn test_get_topics() {
    let topics = get_topics("devnet0".to_string());
    assert_eq!(topics.len(), 2);
    assert!(topics.iter().all(|topic| topic.network == "devnet0"));
}

#[test]
fn test_parse_topic_string() {
    let (prefix, network, name, encoding) =
        parse_topic_string("/gossipnode/devnet0/txs/snappy").expect("Failed to parse");

    assert_eq!(prefix, "gossipnode");
    assert_eq!(network, "devnet0");
    assert_eq!(name, "txs");
    assert_eq!(encoding, "snappy");
}
