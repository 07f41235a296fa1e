pub mod caching;
pub mod coin_balances;
pub mod db;
pub mod env;
pub mod execution_chain;
pub mod json_codecs;
pub mod performance;
pub mod units;
