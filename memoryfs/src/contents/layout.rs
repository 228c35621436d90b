//! Block geometry and address translation: split a byte range into per-block spans.

/// Object header of a heap byte array, kept out of each block so a block
/// plus its header fits one 4 KiB page.
const ARRAY_HEADER: usize = 8 + 8 + 4;

/// Usable bytes per block.
pub const BLOCK_SIZE: usize = 4096 - ARRAY_HEADER;

/// Capacity of the indirect table: one block worth of block references.
pub const MAX_INDIRECT_BLOCKS: usize = BLOCK_SIZE;

/// Direct block plus every indirect block.
pub const MAX_BLOCKS: usize = 1 + MAX_INDIRECT_BLOCKS;

/// Largest addressable content length in bytes.
pub const MAX_CAPACITY: u64 = MAX_BLOCKS as u64 * BLOCK_SIZE as u64;

/// One piece of a transfer that lies inside a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// 0 is the direct block, `k > 0` is indirect block `k - 1`.
    pub block_index: usize,
    pub offset_in_block: usize,
    pub len: usize,
}

pub fn block_index_of(position: u64) -> u64 {
    position / BLOCK_SIZE as u64
}

pub fn within_block_offset(position: u64) -> usize {
    (position % BLOCK_SIZE as u64) as usize
}

/// Number of blocks (direct block included) needed to hold `capacity` bytes.
/// The direct block always exists, so the answer is never below 1.
pub fn blocks_required(capacity: u64) -> u64 {
    capacity.div_ceil(BLOCK_SIZE as u64).max(1)
}

/// Split `[position, position + len)` into block-local spans.
///
/// Callers must have checked that the range is addressable; block indices
/// are not bounded here.
pub fn block_spans(position: u64, len: usize) -> BlockSpans {
    BlockSpans {
        block_index: block_index_of(position) as usize,
        offset_in_block: within_block_offset(position),
        remaining: len,
    }
}

#[derive(Debug, Clone)]
pub struct BlockSpans {
    block_index: usize,
    offset_in_block: usize,
    remaining: usize,
}

impl Iterator for BlockSpans {
    type Item = BlockSpan;

    fn next(&mut self) -> Option<BlockSpan> {
        if self.remaining == 0 {
            return None;
        }
        let take = (BLOCK_SIZE - self.offset_in_block).min(self.remaining);
        let span = BlockSpan {
            block_index: self.block_index,
            offset_in_block: self.offset_in_block,
            len: take,
        };
        self.remaining -= take;
        self.block_index += 1;
        self.offset_in_block = 0;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = if self.remaining == 0 {
            0
        } else {
            (self.offset_in_block + self.remaining).div_ceil(BLOCK_SIZE)
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for BlockSpans {}
