use crate::execution_chain::Address;
use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;
use tracing::{debug, warn};

/// Channel the read side listens on for balance cache expiry.
pub const CACHE_EXPIRE_CHANNEL: &str = "balance-cache-expire";

#[automock]
#[async_trait]
pub trait BalanceCache {
    /// Drop cached balance reads for the given addresses. Best-effort: a
    /// listener that misses an expiry serves a stale read until the next
    /// import, nothing worse.
    async fn invalidate(&self, addresses: &[Address]);
}

pub struct CachePostgres {
    db_pool: PgPool,
}

impl CachePostgres {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BalanceCache for CachePostgres {
    async fn invalidate(&self, addresses: &[Address]) {
        for address in addresses {
            let notify = sqlx::query("SELECT pg_notify($1, $2)")
                .bind(CACHE_EXPIRE_CHANNEL)
                .bind(address.as_str())
                .execute(&self.db_pool)
                .await;
            if let Err(error) = notify {
                warn!(%address, %error, "failed to expire cached balance");
            }
        }
        debug!(count = addresses.len(), "published balance cache expiry");
    }
}
