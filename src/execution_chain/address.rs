use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A 20-byte account identifier in its canonical text form: 0x followed by 40
/// lowercase hex characters. Construction is the only place a malformed
/// encoding can be rejected, everything downstream relies on that.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(String);

#[derive(Debug, Error)]
pub enum ParseAddressError {
    #[error("address {0} is missing the 0x prefix")]
    MissingPrefix(String),
    #[error("address {0} is not 20 bytes of hex")]
    InvalidLength(String),
    #[error("address {0} contains non-hex characters")]
    InvalidDigits(String),
}

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| ParseAddressError::MissingPrefix(s.to_string()))?;
        if digits.len() != 40 {
            return Err(ParseAddressError::InvalidLength(s.to_string()));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseAddressError::InvalidDigits(s.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
