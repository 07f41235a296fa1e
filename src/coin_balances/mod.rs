//! Fetches coin balances for (address, block) pairs from the execution node
//! in one batched call, commits what succeeded together with its derived
//! datasets, and reports what must be resubmitted.
pub mod daily;
pub mod entries;
pub mod fetch;
pub mod import;
pub mod retry;

use crate::caching::BalanceCache;
use crate::execution_chain::node::ExecutionNode;
use crate::execution_chain::{Address, BlockNumber, TraceWindow};
use crate::performance::TimedExt;
use crate::units::WeiNewtype;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub use daily::derive_daily_balances;
pub use entries::{normalize_entries, BalanceEntry};
pub use fetch::{fetch_balances, BalanceFetch, FetchError};
pub use import::{
    derive_address_balances, AddressBalance, BalanceImport, BalanceStore, ImportError, ImportMode,
    StorePostgres,
};

/// A coin balance observed for an address at a specific block. Immutable
/// once produced.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CoinBalance {
    pub address: Address,
    pub block_number: BlockNumber,
    pub value: WeiNewtype,
    pub value_fetched_at: DateTime<Utc>,
}

/// One balance per address per calendar day, derived from that day's
/// per-block records.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DailyCoinBalance {
    pub address: Address,
    pub day: NaiveDate,
    pub value: WeiNewtype,
}

/// What one pipeline invocation came to.
#[derive(Debug, Eq, PartialEq)]
pub enum FetchOutcome {
    /// Everything submitted is durably committed, or there was nothing to do.
    Committed,
    /// Entries the caller should resubmit. Everything not listed here is
    /// committed.
    RetryNeeded(Vec<BalanceEntry>),
    /// The invocation failed in a way resubmitting fetches would not help.
    Fatal(String),
}

/// One full pipeline invocation: normalize the work list, fetch balances in
/// one batch, derive daily snapshots and address projections, commit
/// atomically, expire cached reads, and hand back whatever must be retried.
pub async fn fetch_and_import_balances(
    node: &impl ExecutionNode,
    store: &impl BalanceStore,
    cache: &impl BalanceCache,
    trace_window: &TraceWindow,
    mode: ImportMode,
    entries: Vec<BalanceEntry>,
) -> FetchOutcome {
    let submitted = entries.len();
    let normalized = normalize_entries(entries, |block_number| trace_window.contains(block_number));
    debug!(
        submitted,
        normalized = normalized.len(),
        "normalized balance entries"
    );

    if normalized.is_empty() {
        debug!("nothing to fetch after normalization");
        return FetchOutcome::Committed;
    }

    let BalanceFetch { balances, errors } = match fetch_balances(node, &normalized).await {
        Err(err) => {
            // nothing of the reply may be interpreted, the whole batch goes back
            warn!(
                count = normalized.len(),
                %err,
                "balance batch failed at the transport level, requeueing every entry"
            );
            return FetchOutcome::RetryNeeded(normalized);
        }
        Ok(fetch) => fetch,
    };

    if !balances.is_empty() {
        let daily_balances = derive_daily_balances(node, &balances)
            .timed("derive daily balances")
            .await;
        let import = BalanceImport::new(&balances, daily_balances, mode);

        let written = match store.import(&import, true).await {
            Err(err) => {
                // the fetched values were not lost, only their durability;
                // requeueing them would duplicate remote calls
                error!(%err, "failed to commit fetched balances");
                return FetchOutcome::Fatal(format!("balance import failed: {err}"));
            }
            Ok(written) => written,
        };

        cache.invalidate(&written).await;
        info!(
            balances = balances.len(),
            daily = import.daily_balances.len(),
            addresses = written.len(),
            "imported coin balances"
        );
    }

    if errors.is_empty() {
        FetchOutcome::Committed
    } else {
        FetchOutcome::RetryNeeded(retry::entries_from_errors(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::import::MockBalanceStore;
    use super::*;
    use crate::caching::MockBalanceCache;
    use crate::execution_chain::node::MockExecutionNodeHttp;

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

    fn open_window() -> TraceWindow {
        TraceWindow {
            first_traceable_block: BlockNumber(0),
            last_traceable_block: None,
        }
    }

    fn timestamp() -> DateTime<Utc> {
        "2024-01-18T13:37:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn partial_batch_commits_and_requeues_test() {
        let node = MockExecutionNodeHttp::new()
            .with_balance(&address_a(), BlockNumber(100), WeiNewtype(7))
            .with_timestamp(BlockNumber(100), timestamp())
            .with_item_error(&address_b(), BlockNumber(50), -32000, "state unavailable");

        let mut store = MockBalanceStore::new();
        store
            .expect_import()
            .withf(|import, broadcast| {
                *broadcast
                    && import.per_block_balances.len() == 1
                    && import.daily_balances.len() == 1
                    && import.addresses
                        == vec![AddressBalance {
                            address: address_a(),
                            balance: WeiNewtype(7),
                            block_number: BlockNumber(100),
                        }]
            })
            .times(1)
            .returning(|_, _| Ok(vec![address_a()]));

        let mut cache = MockBalanceCache::new();
        cache
            .expect_invalidate()
            .withf(|addresses| addresses == [address_a()].as_slice())
            .times(1)
            .returning(|_| ());

        let outcome = fetch_and_import_balances(
            &node,
            &store,
            &cache,
            &open_window(),
            ImportMode::WithBlockHistory,
            vec![entry(&address_a(), 100), entry(&address_b(), 50)],
        )
        .await;

        assert_eq!(
            outcome,
            FetchOutcome::RetryNeeded(vec![entry(&address_b(), 50)])
        );
    }

    #[tokio::test]
    async fn transport_failure_requeues_everything_test() {
        let node = MockExecutionNodeHttp::new().with_balances_unreachable();
        // no expectations: any store or cache call panics the test
        let store = MockBalanceStore::new();
        let cache = MockBalanceCache::new();

        let entries = vec![entry(&address_a(), 100), entry(&address_b(), 50)];
        let outcome = fetch_and_import_balances(
            &node,
            &store,
            &cache,
            &open_window(),
            ImportMode::WithBlockHistory,
            entries.clone(),
        )
        .await;

        assert_eq!(outcome, FetchOutcome::RetryNeeded(entries));
    }

    #[tokio::test]
    async fn nothing_to_do_short_circuits_test() {
        let node = MockExecutionNodeHttp::new();
        let store = MockBalanceStore::new();
        let cache = MockBalanceCache::new();
        let window = TraceWindow {
            first_traceable_block: BlockNumber(1_000),
            last_traceable_block: None,
        };

        let outcome = fetch_and_import_balances(
            &node,
            &store,
            &cache,
            &window,
            ImportMode::WithBlockHistory,
            vec![entry(&address_a(), 100)],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::Committed);
    }

    #[tokio::test]
    async fn failed_import_is_fatal_test() {
        let node = MockExecutionNodeHttp::new()
            .with_balance(&address_a(), BlockNumber(100), WeiNewtype(7))
            .with_timestamp(BlockNumber(100), timestamp());

        let mut store = MockBalanceStore::new();
        store
            .expect_import()
            .times(1)
            .returning(|_, _| Err(ImportError::Database(sqlx::Error::RowNotFound)));
        let cache = MockBalanceCache::new();

        let outcome = fetch_and_import_balances(
            &node,
            &store,
            &cache,
            &open_window(),
            ImportMode::WithBlockHistory,
            vec![entry(&address_a(), 100)],
        )
        .await;

        assert!(matches!(outcome, FetchOutcome::Fatal(_)));
    }

    #[tokio::test]
    async fn full_success_commits_everything_test() {
        let node = MockExecutionNodeHttp::new()
            .with_balance(&address_a(), BlockNumber(100), WeiNewtype(5))
            .with_balance(&address_b(), BlockNumber(200), WeiNewtype(9))
            .with_timestamp(BlockNumber(100), timestamp())
            .with_timestamp(BlockNumber(200), timestamp());

        let mut store = MockBalanceStore::new();
        store
            .expect_import()
            .withf(|import, _| import.per_block_balances.len() == 2 && import.addresses.len() == 2)
            .times(1)
            .returning(|_, _| Ok(vec![address_a(), address_b()]));

        let mut cache = MockBalanceCache::new();
        cache
            .expect_invalidate()
            .withf(|addresses| addresses.len() == 2)
            .times(1)
            .returning(|_| ());

        let outcome = fetch_and_import_balances(
            &node,
            &store,
            &cache,
            &open_window(),
            ImportMode::WithBlockHistory,
            vec![entry(&address_a(), 100), entry(&address_b(), 200)],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::Committed);
    }

    #[tokio::test]
    async fn daily_only_mode_omits_history_test() {
        let node = MockExecutionNodeHttp::new()
            .with_balance(&address_a(), BlockNumber(100), WeiNewtype(5))
            .with_timestamp(BlockNumber(100), timestamp());

        let mut store = MockBalanceStore::new();
        store
            .expect_import()
            .withf(|import, _| {
                import.per_block_balances.is_empty()
                    && import.addresses.len() == 1
                    && import.daily_balances.len() == 1
            })
            .times(1)
            .returning(|_, _| Ok(vec![address_a()]));

        let mut cache = MockBalanceCache::new();
        cache.expect_invalidate().times(1).returning(|_| ());

        let outcome = fetch_and_import_balances(
            &node,
            &store,
            &cache,
            &open_window(),
            ImportMode::DailyOnly,
            vec![entry(&address_a(), 100)],
        )
        .await;

        assert_eq!(outcome, FetchOutcome::Committed);
    }
}
