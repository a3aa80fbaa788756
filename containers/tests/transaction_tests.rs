use containers::{DEFAULT_BODY_SIZE, TX_ID_LEN, Transaction, TransactionBody, TransactionId};
use pretty_assertions::assert_eq;

#[test]
fn test_random_ids_are_distinct() {
    let a = TransactionId::random();
    let b = TransactionId::random();

    assert_ne!(a, b);
    assert_eq!(a.as_bytes().len(), TX_ID_LEN);
}

#[test]
fn test_key_is_lowercase_hex() {
    let id = TransactionId([0xab; TX_ID_LEN]);

    assert_eq!(id.to_key(), "ab".repeat(TX_ID_LEN));
    assert_eq!(id.to_key(), id.to_string());
}

#[test]
fn test_parse_key_back() {
    let id = TransactionId::random();
    let parsed: TransactionId = id.to_key().parse().expect("valid hex key");
    assert_eq!(parsed, id);

    let prefixed: TransactionId = format!("0x{}", id.to_key()).parse().expect("0x prefix accepted");
    assert_eq!(prefixed, id);
}

#[test]
fn test_parse_rejects_wrong_length() {
    assert!("abcd".parse::<TransactionId>().is_err());
    assert!("zz".repeat(TX_ID_LEN).parse::<TransactionId>().is_err());
}

#[test]
fn test_from_slice_requires_exact_length() {
    assert!(TransactionId::from_slice(&[1u8; TX_ID_LEN]).is_some());
    assert!(TransactionId::from_slice(&[1u8; TX_ID_LEN - 1]).is_none());
    assert!(TransactionId::from_slice(&[1u8; TX_ID_LEN + 1]).is_none());
    assert!(TransactionId::from_slice(&[]).is_none());
}

#[test]
fn test_random_transaction_uses_requested_body_size() {
    let tx = Transaction::random(DEFAULT_BODY_SIZE);
    assert_eq!(tx.body.len(), DEFAULT_BODY_SIZE);

    let empty = Transaction::random(0);
    assert!(empty.body.is_empty());
}

#[test]
fn test_json_uses_hex_strings() {
    let tx = Transaction::new(TransactionId([1u8; TX_ID_LEN]), TransactionBody::new(vec![0xde, 0xad]));

    let json = serde_json::to_value(&tx).expect("serialize");
    assert_eq!(json["id"], "01".repeat(TX_ID_LEN));
    assert_eq!(json["body"], "dead");

    let decoded: Transaction = serde_json::from_value(json).expect("deserialize");
    assert_eq!(decoded, tx);
}

#[test]
fn test_json_rejects_short_id() {
    let json = serde_json::json!({ "id": "0102", "body": "" });
    assert!(serde_json::from_value::<Transaction>(json).is_err());
}
