use super::{CoinBalance, DailyCoinBalance};
use crate::execution_chain::node::ExecutionNode;
use crate::execution_chain::BlockNumber;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Resolve each distinct referenced block to a calendar day, then fold the
/// per-block balances into per-(address, day) snapshots. A block whose
/// timestamp cannot be resolved contributes nothing to the daily dataset;
/// the per-block history is unaffected.
pub async fn derive_daily_balances(
    node: &impl ExecutionNode,
    balances: &[CoinBalance],
) -> Vec<DailyCoinBalance> {
    let mut block_numbers: Vec<BlockNumber> = balances
        .iter()
        .map(|balance| balance.block_number)
        .collect();
    block_numbers.sort();
    block_numbers.dedup();

    // one lookup per distinct block, sequential so the call order stays deterministic
    let mut block_days: HashMap<BlockNumber, NaiveDate> = HashMap::new();
    for block_number in block_numbers {
        match node.get_block_timestamp(block_number).await {
            Ok(Some(timestamp)) => {
                block_days.insert(block_number, timestamp.date_naive());
            }
            Ok(None) => {
                debug!(
                    %block_number,
                    "block has no timestamp, dropping its balances from the daily dataset"
                );
            }
            Err(error) => {
                warn!(
                    %block_number,
                    %error,
                    "failed to resolve block timestamp, dropping its balances from the daily dataset"
                );
            }
        }
    }

    balances
        .iter()
        .filter_map(|balance| {
            block_days
                .get(&balance.block_number)
                .map(|day| DailyCoinBalance {
                    address: balance.address.clone(),
                    day: *day,
                    value: balance.value,
                })
        })
        .collect()
}
