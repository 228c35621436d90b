use serde::{Deserialize, Serialize};

use crate::contents::layout::MAX_BLOCKS;
use crate::error::{ContentsError, Result};

/// Largest single transfer, kept to what a signed 32 bit length can express.
pub const DEFAULT_MAX_TRANSFER: usize = i32::MAX as usize;

/// Construction options for [`MemoryContents`](crate::MemoryContents).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ContentsConfig {
    /// Blocks to allocate up front; 0 and 1 both mean the direct block only.
    pub initial_blocks: usize,
    /// Reads and writes longer than this are copied in several pieces.
    pub max_transfer: usize,
}

impl Default for ContentsConfig {
    fn default() -> Self {
        Self {
            initial_blocks: 0,
            max_transfer: DEFAULT_MAX_TRANSFER,
        }
    }
}

impl ContentsConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| ContentsError::InvalidConfig(format!("parsing contents config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_transfer == 0 {
            return Err(ContentsError::InvalidConfig(
                "max_transfer must be greater than zero".into(),
            ));
        }
        if self.initial_blocks > MAX_BLOCKS {
            return Err(ContentsError::CapacityExceeded {
                required_blocks: self.initial_blocks as u64,
                max_blocks: MAX_BLOCKS as u64,
            });
        }
        Ok(())
    }
}
