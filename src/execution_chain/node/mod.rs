//! Talks to an execution node over JSON-RPC: one batched call for coin
//! balances and a per-block call for header timestamps.
pub mod mock_execution_node;

use crate::env::ENV_CONFIG;
use crate::execution_chain::{Address, BlockNumber};
use crate::json_codecs::{block_number_from_quantity_str, timestamp_from_quantity_str};
use crate::units::WeiNewtype;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use mock_execution_node::MockExecutionNodeHttp;

// client-side classification codes for replies the endpoint mangled
const MALFORMED_RESPONSE_CODE: i64 = -32700;
const MISSING_RESPONSE_CODE: i64 = -32603;

/// One item of the batched balance request, already in wire form.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BalanceParam {
    pub address: String,
    pub block_quantity: String,
}

impl BalanceParam {
    pub fn new(address: &Address, block_number: BlockNumber) -> Self {
        Self {
            address: address.to_string(),
            block_quantity: block_number.to_quantity_string(),
        }
    }
}

/// Structured rejection the endpoint reports for a single batch item.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Error)]
#[error("({code}) {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BalanceOutcome {
    Balance(WeiNewtype),
    Error(RpcError),
}

#[automock]
#[async_trait]
pub trait ExecutionNode {
    /// One batched call covering every param. Err means the call itself could
    /// not be completed; per-item rejections come back inside the Vec, which
    /// always holds exactly one outcome per submitted param.
    async fn get_balances(&self, params: &[BalanceParam]) -> Result<Vec<BalanceOutcome>>;

    /// Timestamp of the given block, None when the node has no such block.
    async fn get_block_timestamp(
        &self,
        block_number: BlockNumber,
    ) -> Result<Option<DateTime<Utc>>>;
}

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

impl RpcRequest {
    fn new(id: u64, method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// The slice of eth_getBlockByNumber we care about.
#[derive(Deserialize)]
struct BlockHeader {
    #[serde(deserialize_with = "block_number_from_quantity_str")]
    number: BlockNumber,
    #[serde(deserialize_with = "timestamp_from_quantity_str")]
    timestamp: DateTime<Utc>,
}

pub struct ExecutionNodeHttp {
    client: reqwest::Client,
    url: String,
}

impl ExecutionNodeHttp {
    pub fn new() -> Self {
        let url = ENV_CONFIG
            .execution_url
            .as_ref()
            .expect("EXECUTION_URL is required in env to fetch balances")
            .clone();
        Self::with_url(url, Duration::from_secs(ENV_CONFIG.rpc_timeout_secs))
    }

    /// Caller-supplied endpoint and timeout. A request running past the
    /// timeout surfaces as a transport error, not a per-item one.
    pub fn with_url(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("expect reqwest client to build");
        Self { client, url }
    }
}

#[async_trait]
impl ExecutionNode for ExecutionNodeHttp {
    async fn get_balances(&self, params: &[BalanceParam]) -> Result<Vec<BalanceOutcome>> {
        let requests: Vec<RpcRequest> = params
            .iter()
            .enumerate()
            .map(|(id, param)| {
                RpcRequest::new(
                    id as u64,
                    "eth_getBalance",
                    json!([param.address, param.block_quantity]),
                )
            })
            .collect();

        let responses: Vec<RpcResponse> = self
            .client
            .post(&self.url)
            .json(&requests)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if responses.len() > params.len() {
            return Err(anyhow!(
                "batched balance call answered {} items for {} requests",
                responses.len(),
                params.len()
            ));
        }

        let mut by_id: HashMap<u64, RpcResponse> = responses
            .into_iter()
            .map(|response| (response.id, response))
            .collect();

        // Exactly one outcome per request id. An id the endpoint silently
        // dropped becomes a per-item error so the caller can requeue it.
        let outcomes = (0..params.len() as u64)
            .map(|id| match by_id.remove(&id) {
                Some(RpcResponse {
                    error: Some(error), ..
                }) => BalanceOutcome::Error(error),
                Some(RpcResponse {
                    result: Some(value),
                    ..
                }) => match value.as_str().map(WeiNewtype::from_quantity_str) {
                    Some(Ok(value)) => BalanceOutcome::Balance(value),
                    _ => BalanceOutcome::Error(RpcError {
                        code: MALFORMED_RESPONSE_CODE,
                        message: format!("malformed balance quantity {value}"),
                    }),
                },
                Some(_) => BalanceOutcome::Error(RpcError {
                    code: MALFORMED_RESPONSE_CODE,
                    message: "response carried neither result nor error".to_string(),
                }),
                None => BalanceOutcome::Error(RpcError {
                    code: MISSING_RESPONSE_CODE,
                    message: "endpoint returned no response for this request".to_string(),
                }),
            })
            .collect();

        Ok(outcomes)
    }

    async fn get_block_timestamp(
        &self,
        block_number: BlockNumber,
    ) -> Result<Option<DateTime<Utc>>> {
        let request = RpcRequest::new(
            0,
            "eth_getBlockByNumber",
            json!([block_number.to_quantity_string(), false]),
        );

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(anyhow!("failed to fetch block {block_number}: {error}"));
        }

        match response.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let header: BlockHeader = serde_json::from_value(value)?;
                debug!(
                    number = %header.number,
                    timestamp = %header.timestamp,
                    "fetched block timestamp"
                );
                Ok(Some(header.timestamp))
            }
        }
    }
}
