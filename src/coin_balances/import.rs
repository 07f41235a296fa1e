use super::{CoinBalance, DailyCoinBalance};
use crate::execution_chain::{Address, BlockNumber};
use crate::units::WeiNewtype;
use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;

/// Channel listeners watch for freshly imported addresses.
pub const IMPORT_BROADCAST_CHANNEL: &str = "balance-imports";

/// Latest-known balance projection for an address.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AddressBalance {
    pub address: Address,
    pub balance: WeiNewtype,
    pub block_number: BlockNumber,
}

/// Project each address onto its record at the highest block of the batch.
/// When two records tie on the block the first fetched one wins; a single
/// address cannot legitimately report two balances at one block.
pub fn derive_address_balances(balances: &[CoinBalance]) -> Vec<AddressBalance> {
    let mut latest: HashMap<&Address, &CoinBalance> = HashMap::new();
    for balance in balances {
        match latest.get(&balance.address) {
            Some(current) if current.block_number >= balance.block_number => {}
            _ => {
                latest.insert(&balance.address, balance);
            }
        }
    }

    let mut address_balances: Vec<AddressBalance> = latest
        .into_values()
        .map(|balance| AddressBalance {
            address: balance.address.clone(),
            balance: balance.value,
            block_number: balance.block_number,
        })
        .collect();
    // deterministic output for diagnostics
    address_balances.sort_by(|a, b| a.address.cmp(&b.address));
    address_balances
}

/// Which derived datasets an import writes. Address projections and daily
/// snapshots are always written, per-block history is optional.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImportMode {
    WithBlockHistory,
    DailyOnly,
}

#[derive(Debug, Eq, PartialEq)]
pub struct BalanceImport {
    pub addresses: Vec<AddressBalance>,
    pub per_block_balances: Vec<CoinBalance>,
    pub daily_balances: Vec<DailyCoinBalance>,
}

impl BalanceImport {
    /// Both import variants construct through here so the aggregation and
    /// summary logic cannot drift apart.
    pub fn new(
        balances: &[CoinBalance],
        daily_balances: Vec<DailyCoinBalance>,
        mode: ImportMode,
    ) -> Self {
        Self {
            addresses: derive_address_balances(balances),
            per_block_balances: match mode {
                ImportMode::WithBlockHistory => balances.to_vec(),
                ImportMode::DailyOnly => Vec::new(),
            },
            daily_balances,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("balance import rejected by the db: {0}")]
    Database(#[from] sqlx::Error),
}

#[automock]
#[async_trait]
pub trait BalanceStore {
    /// Persist the datasets as one atomic unit. Returns the addresses
    /// actually written, for cache invalidation.
    async fn import(
        &self,
        import: &BalanceImport,
        broadcast: bool,
    ) -> Result<Vec<Address>, ImportError>;
}

pub struct StorePostgres {
    db_pool: PgPool,
}

impl StorePostgres {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BalanceStore for StorePostgres {
    async fn import(
        &self,
        import: &BalanceImport,
        broadcast: bool,
    ) -> Result<Vec<Address>, ImportError> {
        let mut transaction = self.db_pool.begin().await?;

        // upsert the latest-balance projection, an older block never
        // overwrites a newer one
        let mut written = Vec::with_capacity(import.addresses.len());
        for address_balance in &import.addresses {
            let row = sqlx::query(
                "
                INSERT INTO addresses (
                    address,
                    fetched_coin_balance,
                    fetched_coin_balance_block_number
                )
                VALUES ($1, $2::numeric, $3)
                ON CONFLICT (address) DO UPDATE SET
                    fetched_coin_balance = EXCLUDED.fetched_coin_balance,
                    fetched_coin_balance_block_number = EXCLUDED.fetched_coin_balance_block_number
                WHERE
                    addresses.fetched_coin_balance_block_number <= EXCLUDED.fetched_coin_balance_block_number
                RETURNING address
                ",
            )
            .bind(address_balance.address.as_str())
            .bind(address_balance.balance.to_string())
            .bind(address_balance.block_number.0)
            .fetch_optional(&mut *transaction)
            .await?;

            if row.is_some() {
                written.push(address_balance.address.clone());
            }
        }

        // identical rows for the same key re-apply cleanly
        for balance in &import.per_block_balances {
            sqlx::query(
                "
                INSERT INTO coin_balances (address, block_number, value, value_fetched_at)
                VALUES ($1, $2, $3::numeric, $4)
                ON CONFLICT (address, block_number) DO UPDATE SET
                    value = EXCLUDED.value,
                    value_fetched_at = EXCLUDED.value_fetched_at
                ",
            )
            .bind(balance.address.as_str())
            .bind(balance.block_number.0)
            .bind(balance.value.to_string())
            .bind(balance.value_fetched_at)
            .execute(&mut *transaction)
            .await?;
        }

        for daily_balance in &import.daily_balances {
            sqlx::query(
                "
                INSERT INTO coin_balances_daily (address, day, value)
                VALUES ($1, $2, $3::numeric)
                ON CONFLICT (address, day) DO UPDATE SET
                    value = EXCLUDED.value
                ",
            )
            .bind(daily_balance.address.as_str())
            .bind(daily_balance.day)
            .bind(daily_balance.value.to_string())
            .execute(&mut *transaction)
            .await?;
        }

        if broadcast {
            // delivered on commit, listeners never see uncommitted imports
            for address in &written {
                sqlx::query("SELECT pg_notify($1, $2)")
                    .bind(IMPORT_BROADCAST_CHANNEL)
                    .bind(address.as_str())
                    .execute(&mut *transaction)
                    .await?;
            }
        }

        transaction.commit().await?;
        Ok(written)
    }
}
