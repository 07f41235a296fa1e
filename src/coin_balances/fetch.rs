use super::entries::BalanceEntry;
use super::CoinBalance;
use crate::execution_chain::node::{BalanceOutcome, BalanceParam, ExecutionNode};
use crate::execution_chain::{Address, BlockNumber};
use anyhow::{anyhow, Result};
use chrono::Utc;

/// Per-item rejection from the batched call. Carries enough to rebuild the
/// original entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchError {
    pub address: Address,
    pub block_number: BlockNumber,
    pub code: i64,
    pub message: String,
}

/// The partitioned result of one batched balance call. Both sides may be
/// non-empty at the same time.
#[derive(Debug)]
pub struct BalanceFetch {
    pub balances: Vec<CoinBalance>,
    pub errors: Vec<FetchError>,
}

/// 1:1 mapping of normalized entries onto wire-ready request parameters.
pub fn to_balance_params(entries: &[BalanceEntry]) -> Vec<BalanceParam> {
    entries
        .iter()
        .map(|entry| BalanceParam::new(&entry.address, entry.block_number))
        .collect()
}

/// Issue the batch and split the reply. Err is a transport-level failure and
/// none of the reply may be interpreted; the caller requeues everything it
/// submitted. On Ok every submitted entry shows up exactly once, as a
/// balance or as an error.
pub async fn fetch_balances(
    node: &impl ExecutionNode,
    entries: &[BalanceEntry],
) -> Result<BalanceFetch> {
    let params = to_balance_params(entries);
    let outcomes = node.get_balances(&params).await?;

    if outcomes.len() != entries.len() {
        return Err(anyhow!(
            "batched balance call returned {} outcomes for {} entries",
            outcomes.len(),
            entries.len()
        ));
    }

    let value_fetched_at = Utc::now();
    let mut balances = Vec::new();
    let mut errors = Vec::new();
    for (entry, outcome) in entries.iter().zip(outcomes) {
        match outcome {
            BalanceOutcome::Balance(value) => balances.push(CoinBalance {
                address: entry.address.clone(),
                block_number: entry.block_number,
                value,
                value_fetched_at,
            }),
            BalanceOutcome::Error(error) => errors.push(FetchError {
                address: entry.address.clone(),
                block_number: entry.block_number,
                code: error.code,
                message: error.message,
            }),
        }
    }

    Ok(BalanceFetch { balances, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_chain::node::MockExecutionNodeHttp;
    use crate::units::WeiNewtype;

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
    fn to_balance_params_test() {
        let params = to_balance_params(&[entry(&address_a(), 100)]);

        assert_eq!(
            params,
            vec![BalanceParam {
                address: "0x00000000000000000000000000000000000000aa".to_string(),
                block_quantity: "0x64".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn fetch_balances_partitions_test() {
        let node = MockExecutionNodeHttp::new()
            .with_balance(&address_a(), BlockNumber(100), WeiNewtype(7))
            .with_item_error(&address_b(), BlockNumber(50), -32000, "state unavailable");
        let entries = vec![entry(&address_a(), 100), entry(&address_b(), 50)];

        let BalanceFetch { balances, errors } = fetch_balances(&node, &entries).await.unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].address, address_a());
        assert_eq!(balances[0].value, WeiNewtype(7));
        assert_eq!(
            errors,
            vec![FetchError {
                address: address_b(),
                block_number: BlockNumber(50),
                code: -32000,
                message: "state unavailable".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn fetch_balances_loses_no_entry_test() {
        let node = MockExecutionNodeHttp::new()
            .with_balance(&address_a(), BlockNumber(100), WeiNewtype(1))
            .with_balance(&address_b(), BlockNumber(50), WeiNewtype(2))
            .with_item_error(&address_a(), BlockNumber(200), -32000, "pruned");
        let entries = vec![
            entry(&address_a(), 100),
            entry(&address_b(), 50),
            entry(&address_a(), 200),
        ];

        let BalanceFetch { balances, errors } = fetch_balances(&node, &entries).await.unwrap();

        assert_eq!(balances.len() + errors.len(), entries.len());
    }

    #[tokio::test]
    async fn fetch_balances_transport_failure_test() {
        let node = MockExecutionNodeHttp::new().with_balances_unreachable();
        let entries = vec![entry(&address_a(), 100)];

        let result = fetch_balances(&node, &entries).await;

        assert!(result.is_err());
    }
}
