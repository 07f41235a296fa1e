use crate::execution_chain::{Address, BlockNumber};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::io::{Read, Write};

/// An (address, block) pair whose coin balance should be fetched. Identity is
/// the pair.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct BalanceEntry {
    pub address: Address,
    pub block_number: BlockNumber,
}

impl Display for BalanceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.address, self.block_number)
    }
}

/// Drop duplicate pairs (first occurrence wins, order stays stable for
/// diagnostics), then drop entries outside the traceable window.
pub fn normalize_entries(
    entries: Vec<BalanceEntry>,
    is_traceable: impl Fn(BlockNumber) -> bool,
) -> Vec<BalanceEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .filter(|entry| is_traceable(entry.block_number))
        .collect()
}

/// Read headerless address,block_number rows.
pub fn entries_from_csv(reader: impl Read) -> Result<Vec<BalanceEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut entries = Vec::new();
    for record in csv_reader.deserialize() {
        let (address, block_number): (Address, i64) = record?;
        entries.push(BalanceEntry {
            address,
            block_number: BlockNumber(block_number),
        });
    }
    Ok(entries)
}

/// Write headerless address,block_number rows, the same shape
/// entries_from_csv reads.
pub fn entries_to_csv(writer: impl Write, entries: &[BalanceEntry]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for entry in entries {
        csv_writer.serialize((entry.address.as_str(), entry.block_number.0))?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_a() -> Address {
        "0x00000000000000000000000000000000000000aa".parse().unwrap()
    }

    fn address_b() -> Address {
        "0x00000000000000000000000000000000000000bb".parse().unwrap()
    }

    fn entry(address: &Address, block_number: i64) -> BalanceEntry {
        BalanceEntry {
            address: address.clone(),
            block_number: BlockNumber(block_number),
        }
    }

    #[test]
    fn normalize_dedups_pairs_test() {
        let entries = vec![
            entry(&address_a(), 100),
            entry(&address_a(), 100),
            entry(&address_b(), 50),
        ];

        let normalized = normalize_entries(entries, |_| true);

        assert_eq!(
            normalized,
            vec![entry(&address_a(), 100), entry(&address_b(), 50)]
        );
    }

    #[test]
    fn normalize_keeps_same_address_at_different_blocks_test() {
        let entries = vec![entry(&address_a(), 100), entry(&address_a(), 200)];

        let normalized = normalize_entries(entries, |_| true);

        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn normalize_filters_untraceable_blocks_test() {
        let entries = vec![entry(&address_a(), 100), entry(&address_b(), 50)];

        let normalized = normalize_entries(entries, |block_number| block_number >= BlockNumber(100));

        assert_eq!(normalized, vec![entry(&address_a(), 100)]);
    }

    #[test]
    fn normalize_is_idempotent_test() {
        let entries = vec![entry(&address_a(), 100), entry(&address_b(), 50)];

        let once = normalize_entries(entries, |_| true);
        let twice = normalize_entries(once.clone(), |_| true);

        assert_eq!(once, twice);
    }

    #[test]
    fn csv_roundtrip_test() {
        let entries = vec![entry(&address_a(), 100), entry(&address_b(), 50)];

        let mut buffer = Vec::new();
        entries_to_csv(&mut buffer, &entries).unwrap();
        let read_back = entries_from_csv(buffer.as_slice()).unwrap();

        assert_eq!(read_back, entries);
    }

    #[test]
    fn csv_rejects_malformed_address_test() {
        let result = entries_from_csv("not-an-address,100\n".as_bytes());
        assert!(result.is_err());
    }
}
