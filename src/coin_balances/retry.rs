use super::entries::BalanceEntry;
use super::fetch::FetchError;
use tracing::warn;

/// Turn the rejected items back into fetchable entries, logging one
/// consolidated summary first. Ordering follows the error list; the items
/// are already unique per entry so there is nothing to dedup.
pub fn entries_from_errors(errors: &[FetchError]) -> Vec<BalanceEntry> {
    let detail = errors
        .iter()
        .map(|error| {
            format!(
                "{}@{}: ({}) {}",
                error.address, error.block_number, error.code, error.message
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    warn!(
        count = errors.len(),
        detail = %detail,
        "balance endpoint rejected items, requeueing them"
    );

    errors
        .iter()
        .map(|error| BalanceEntry {
            address: error.address.clone(),
            block_number: error.block_number,
        })
        .collect()
}
