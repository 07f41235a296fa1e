use super::{BalanceOutcome, BalanceParam, ExecutionNode, RpcError};
use crate::execution_chain::{Address, BlockNumber};
use crate::units::WeiNewtype;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory stand-in for ExecutionNodeHttp, serving fixture data.
pub struct MockExecutionNodeHttp {
    balances: HashMap<BalanceParam, WeiNewtype>,
    item_errors: HashMap<BalanceParam, RpcError>,
    timestamps: HashMap<BlockNumber, DateTime<Utc>>,
    balances_unreachable: bool,
    blocks_unreachable: bool,
    requested_blocks: Mutex<Vec<BlockNumber>>,
}

impl MockExecutionNodeHttp {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            item_errors: HashMap::new(),
            timestamps: HashMap::new(),
            balances_unreachable: false,
            blocks_unreachable: false,
            requested_blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(
        mut self,
        address: &Address,
        block_number: BlockNumber,
        value: WeiNewtype,
    ) -> Self {
        self.balances
            .insert(BalanceParam::new(address, block_number), value);
        self
    }

    pub fn with_item_error(
        mut self,
        address: &Address,
        block_number: BlockNumber,
        code: i64,
        message: &str,
    ) -> Self {
        self.item_errors.insert(
            BalanceParam::new(address, block_number),
            RpcError {
                code,
                message: message.to_string(),
            },
        );
        self
    }

    pub fn with_timestamp(mut self, block_number: BlockNumber, timestamp: DateTime<Utc>) -> Self {
        self.timestamps.insert(block_number, timestamp);
        self
    }

    pub fn with_balances_unreachable(mut self) -> Self {
        self.balances_unreachable = true;
        self
    }

    pub fn with_blocks_unreachable(mut self) -> Self {
        self.blocks_unreachable = true;
        self
    }

    /// Block lookups observed so far, in call order.
    pub fn requested_blocks(&self) -> Vec<BlockNumber> {
        self.requested_blocks.lock().unwrap().clone()
    }
}

impl Default for MockExecutionNodeHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionNode for MockExecutionNodeHttp {
    async fn get_balances(&self, params: &[BalanceParam]) -> Result<Vec<BalanceOutcome>> {
        if self.balances_unreachable {
            return Err(anyhow!("connection refused"));
        }
        let outcomes = params
            .iter()
            .map(|param| {
                if let Some(value) = self.balances.get(param) {
                    BalanceOutcome::Balance(*value)
                } else if let Some(error) = self.item_errors.get(param) {
                    BalanceOutcome::Error(error.clone())
                } else {
                    BalanceOutcome::Error(RpcError {
                        code: -32000,
                        message: format!(
                            "no balance fixture for {}@{}",
                            param.address, param.block_quantity
                        ),
                    })
                }
            })
            .collect();
        Ok(outcomes)
    }

    async fn get_block_timestamp(
        &self,
        block_number: BlockNumber,
    ) -> Result<Option<DateTime<Utc>>> {
        self.requested_blocks.lock().unwrap().push(block_number);
        if self.blocks_unreachable {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.timestamps.get(&block_number).copied())
    }
}
