use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::num::ParseIntError;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

/// A wei amount. Balances overflow f64 well before the largest accounts, so
/// serialization goes through decimal strings, never JSON numbers.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WeiNewtype(pub i128);

#[derive(Debug, Error)]
pub enum ParseWeiError {
    #[error("wei quantity {0} is missing the 0x prefix")]
    MissingPrefix(String),
    #[error("failed to parse wei quantity {0}")]
    InvalidDigits(String),
}

impl WeiNewtype {
    /// Parse a JSON-RPC quantity, e.g. "0xde0b6b3a7640000".
    pub fn from_quantity_str(quantity: &str) -> Result<Self, ParseWeiError> {
        let digits = quantity
            .strip_prefix("0x")
            .ok_or_else(|| ParseWeiError::MissingPrefix(quantity.to_string()))?;
        i128::from_str_radix(digits, 16)
            .map(WeiNewtype)
            .map_err(|_| ParseWeiError::InvalidDigits(quantity.to_string()))
    }
}

impl Add for WeiNewtype {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for WeiNewtype {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Display for WeiNewtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WeiNewtype {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i128>().map(WeiNewtype)
    }
}

impl From<WeiNewtype> for i128 {
    fn from(wei: WeiNewtype) -> Self {
        wei.0
    }
}

impl Serialize for WeiNewtype {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for WeiNewtype {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
