use coin_balance_backend::caching::CachePostgres;
use coin_balance_backend::coin_balances::{
    entries, fetch_and_import_balances, FetchOutcome, ImportMode, StorePostgres,
};
use coin_balance_backend::db::db;
use coin_balance_backend::execution_chain::node::ExecutionNodeHttp;
use coin_balance_backend::execution_chain::TraceWindow;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("fetching coin balances");

    // one address,block_number row per entry
    let entries = entries::entries_from_csv(std::io::stdin())
        .expect("expect address,block_number rows on stdin");

    let db_pool = db::get_db_pool("fetch-coin-balances", 3).await;
    sqlx::migrate!("./migrations").run(&db_pool).await.unwrap();

    let node = ExecutionNodeHttp::new();
    let store = StorePostgres::new(db_pool.clone());
    let cache = CachePostgres::new(db_pool);
    let trace_window = TraceWindow::from_env();

    match fetch_and_import_balances(
        &node,
        &store,
        &cache,
        &trace_window,
        ImportMode::WithBlockHistory,
        entries,
    )
    .await
    {
        FetchOutcome::Committed => {
            info!("done fetching coin balances");
        }
        FetchOutcome::RetryNeeded(retry_entries) => {
            warn!(
                count = retry_entries.len(),
                "some entries need resubmission, writing them to stdout"
            );
            entries::entries_to_csv(std::io::stdout(), &retry_entries)
                .expect("expect to be able to write the retry set to stdout");
            std::process::exit(1);
        }
        FetchOutcome::Fatal(reason) => {
            error!(reason = %reason, "fetching coin balances failed");
            std::process::exit(2);
        }
    }
}
