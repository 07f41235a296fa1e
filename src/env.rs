use lazy_static::lazy_static;
use std::env;

const DEFAULT_RPC_TIMEOUT_SECS: u64 = 16;

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

#[derive(Clone, Debug)]
pub struct EnvConfig {
    pub db_url: String,
    pub execution_url: Option<String>,
    pub first_traceable_block: i64,
    pub last_traceable_block: Option<i64>,
    pub rpc_timeout_secs: u64,
}

fn get_env_var(name: &str) -> Option<String> {
    match env::var(name) {
        Err(env::VarError::NotPresent) => None,
        Err(err) => panic!("failed to read env var {name}: {err}"),
        Ok(var) => Some(var),
    }
}

fn get_env_config() -> EnvConfig {
    EnvConfig {
        db_url: get_env_var("DATABASE_URL").expect("DATABASE_URL is required in env"),
        execution_url: get_env_var("EXECUTION_URL"),
        first_traceable_block: get_env_var("FIRST_TRACEABLE_BLOCK")
            .map(|block| {
                block
                    .parse()
                    .expect("expect FIRST_TRACEABLE_BLOCK to be a block number")
            })
            .unwrap_or(0),
        last_traceable_block: get_env_var("LAST_TRACEABLE_BLOCK").map(|block| {
            block
                .parse()
                .expect("expect LAST_TRACEABLE_BLOCK to be a block number")
        }),
        rpc_timeout_secs: get_env_var("RPC_TIMEOUT_SECS")
            .map(|timeout| {
                timeout
                    .parse()
                    .expect("expect RPC_TIMEOUT_SECS to be a number of seconds")
            })
            .unwrap_or(DEFAULT_RPC_TIMEOUT_SECS),
    }
}
