//! Serde helpers for the hex quantity encoding the execution node's JSON-RPC
//! responses use for numbers.

use crate::execution_chain::BlockNumber;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer};

pub fn block_number_from_quantity_str<'de, D>(deserializer: D) -> Result<BlockNumber, D::Error>
where
    D: Deserializer<'de>,
{
    let quantity = String::deserialize(deserializer)?;
    BlockNumber::from_quantity_str(&quantity).map_err(de::Error::custom)
}

pub fn timestamp_from_quantity_str<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let quantity = String::deserialize(deserializer)?;
    let digits = quantity.strip_prefix("0x").ok_or_else(|| {
        de::Error::custom(format!("timestamp quantity {quantity} is missing the 0x prefix"))
    })?;
    let seconds = i64::from_str_radix(digits, 16).map_err(de::Error::custom)?;
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| de::Error::custom(format!("timestamp {seconds} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct TestEnvelope {
        #[serde(deserialize_with = "block_number_from_quantity_str")]
        number: BlockNumber,
        #[serde(deserialize_with = "timestamp_from_quantity_str")]
        timestamp: DateTime<Utc>,
    }

    #[test]
    fn quantities_from_json_test() {
        let envelope: TestEnvelope =
            serde_json::from_str(r#"{"number": "0x64", "timestamp": "0x65a86a00"}"#).unwrap();
        assert_eq!(envelope.number, BlockNumber(100));
        assert_eq!(
            envelope.timestamp,
            "2024-01-18T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn rejects_unprefixed_timestamp_test() {
        let result = serde_json::from_str::<TestEnvelope>(r#"{"number": "0x64", "timestamp": "65a8d2f0"}"#);
        assert!(result.is_err());
    }
}
