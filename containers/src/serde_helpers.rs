// Serde helpers for byte containers that travel as hex strings in
// configuration files and JSON dumps.

/// (De)serializes any byte container as a lowercase hex string,
/// accepting an optional `0x` prefix on input.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(value.as_ref()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let hex_str = String::deserialize(deserializer)?;
        let bytes = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| D::Error::custom(format!("invalid hex: {e}")))?;
        let len = bytes.len();

        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected byte length {len}")))
    }
}
