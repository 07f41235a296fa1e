use crate::env::ENV_CONFIG;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

// create db connection pool instance with the given max connection count,
// the pool name shows up as the connection's application_name in pg_stat_activity
pub async fn get_db_pool(name: &str, max_connections: u32) -> PgPool {
    let options: PgConnectOptions = ENV_CONFIG
        .db_url
        .parse()
        .expect("expect DATABASE_URL to be a valid postgres url");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options.application_name(name))
        .await
        .expect("expect to be able to connect to the db")
}
