mod address;
mod block_number;
pub mod node;

use crate::env::ENV_CONFIG;

pub use address::{Address, ParseAddressError};
pub use block_number::{BlockNumber, ParseBlockNumberError};

/// The window of blocks the connected node can serve balances for. Blocks
/// below the window are pruned, blocks above it do not exist yet.
#[derive(Clone, Debug)]
pub struct TraceWindow {
    pub first_traceable_block: BlockNumber,
    pub last_traceable_block: Option<BlockNumber>,
}

impl TraceWindow {
    pub fn from_env() -> Self {
        Self {
            first_traceable_block: BlockNumber(ENV_CONFIG.first_traceable_block),
            last_traceable_block: ENV_CONFIG.last_traceable_block.map(BlockNumber),
        }
    }

    pub fn contains(&self, block_number: BlockNumber) -> bool {
        block_number >= self.first_traceable_block
            && self
                .last_traceable_block
                .map_or(true, |last| block_number <= last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_window_bounded_test() {
        let window = TraceWindow {
            first_traceable_block: BlockNumber(10),
            last_traceable_block: Some(BlockNumber(20)),
        };
        assert!(!window.contains(BlockNumber(9)));
        assert!(window.contains(BlockNumber(10)));
        assert!(window.contains(BlockNumber(20)));
        assert!(!window.contains(BlockNumber(21)));
    }

    #[test]
    fn trace_window_open_ended_test() {
        let window = TraceWindow {
            first_traceable_block: BlockNumber(0),
            last_traceable_block: None,
        };
        assert!(window.contains(BlockNumber(i64::MAX)));
    }
}
