use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    PartialEq,
    Serialize,
    sqlx::Type,
)]
#[sqlx(transparent)]
pub struct BlockNumber(pub i64);

#[derive(Debug, Error)]
pub enum ParseBlockNumberError {
    #[error("block quantity {0} is missing the 0x prefix")]
    MissingPrefix(String),
    #[error("failed to parse block quantity {0}")]
    InvalidDigits(String),
}

impl BlockNumber {
    pub const GENESIS: Self = Self(0);

    /// The JSON-RPC quantity form, e.g. "0x64" for block 100.
    pub fn to_quantity_string(self) -> String {
        format!("0x{:x}", self.0)
    }

    pub fn from_quantity_str(quantity: &str) -> Result<Self, ParseBlockNumberError> {
        let digits = quantity
            .strip_prefix("0x")
            .ok_or_else(|| ParseBlockNumberError::MissingPrefix(quantity.to_string()))?;
        i64::from_str_radix(digits, 16)
            .map(BlockNumber)
            .map_err(|_| ParseBlockNumberError::InvalidDigits(quantity.to_string()))
    }
}

impl Display for BlockNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<i64> for BlockNumber {
    type Output = Self;

    fn add(self, rhs: i64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<i64> for BlockNumber {
    type Output = Self;

    fn sub(self, rhs: i64) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl From<i64> for BlockNumber {
    fn from(block_number: i64) -> Self {
        Self(block_number)
    }
}

impl From<BlockNumber> for i64 {
    fn from(block_number: BlockNumber) -> Self {
        block_number.0
    }
}

impl FromStr for BlockNumber {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
