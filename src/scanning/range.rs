use serde::{Deserialize, Serialize};

use crate::utils::{Result, ScannerError};

/// Inclusive block interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRange {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockRange {
    pub fn new(from_block: u64, to_block: u64) -> Result<Self> {
        if from_block > to_block {
            return Err(ScannerError::Configuration(format!(
                "block range {from_block}-{to_block} is inverted"
            )));
        }
        Ok(Self { from_block, to_block })
    }

    /// Number of blocks covered (saturates for the full u64 span).
    pub fn width(&self) -> u64 {
        (self.to_block - self.from_block).saturating_add(1)
    }

    /// First `width` blocks of this range, or the whole range if shorter.
    pub fn head(&self, width: u64) -> BlockRange {
        let to_block = self
            .from_block
            .saturating_add(width.max(1) - 1)
            .min(self.to_block);
        BlockRange { from_block: self.from_block, to_block }
    }

    /// What is left after `head`, if anything.
    pub fn after(&self, head: &BlockRange) -> Option<BlockRange> {
        if head.to_block >= self.to_block {
            None
        } else {
            Some(BlockRange {
                from_block: head.to_block + 1,
                to_block: self.to_block,
            })
        }
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from_block, self.to_block)
    }
}

/// Left-to-right partition of a range into sub-ranges no wider than `max_chunk`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    remaining: Option<BlockRange>,
    max_chunk: u64,
}

impl ChunkPlan {
    pub fn new(range: BlockRange, max_chunk: u64) -> Result<Self> {
        // Fields are public, so a literal may bypass `BlockRange::new`.
        let range = BlockRange::new(range.from_block, range.to_block)?;
        if max_chunk == 0 {
            return Err(ScannerError::Configuration("max chunk must be at least 1 block".into()));
        }
        Ok(Self {
            remaining: Some(range),
            max_chunk,
        })
    }
}

impl Iterator for ChunkPlan {
    type Item = BlockRange;

    fn next(&mut self) -> Option<BlockRange> {
        let remaining = self.remaining?;
        let chunk = remaining.head(self.max_chunk);
        self.remaining = remaining.after(&chunk);
        Some(chunk)
    }
}
