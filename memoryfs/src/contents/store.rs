//! Block store: one file's bytes held in fixed-size blocks behind a single reader/writer lock.

use std::fmt;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::channel::{AppendingBlockChannel, BlockChannel};
use super::layout::{BLOCK_SIZE, MAX_BLOCKS, MAX_INDIRECT_BLOCKS, block_spans, blocks_required};
use super::reader::ContentsReader;
use crate::config::ContentsConfig;
use crate::error::{ContentsError, Result};

/// The content of one file.
///
/// The first [`BLOCK_SIZE`] bytes live in the direct block. Everything after
/// goes into indirect blocks reached through a table that is only allocated
/// once the direct block overflows. Blocks are never released: truncation
/// shrinks the logical size only.
///
/// Every operation takes the lock for its whole duration and no block is
/// handed out by reference, so readers never observe a half-applied write.
pub struct MemoryContents {
    blocks: RwLock<Blocks>,
    max_transfer: usize,
}

struct Blocks {
    direct: Box<[u8]>,
    /// Reserved to `MAX_INDIRECT_BLOCKS` entries on first use.
    indirect: Vec<Box<[u8]>>,
    size: u64,
    /// Largest size ever reached. Bytes at or past this mark are still zero
    /// from allocation.
    high_water: u64,
}

fn zeroed_block() -> Box<[u8]> {
    vec![0u8; BLOCK_SIZE].into_boxed_slice()
}

impl Blocks {
    fn with_blocks(initial_blocks: usize) -> Self {
        let mut indirect = Vec::new();
        if initial_blocks > 1 {
            indirect.reserve_exact(MAX_INDIRECT_BLOCKS);
            indirect.extend((1..initial_blocks).map(|_| zeroed_block()));
        }
        Self {
            direct: zeroed_block(),
            indirect,
            size: 0,
            high_water: 0,
        }
    }

    fn allocated(&self) -> usize {
        1 + self.indirect.len()
    }

    fn block(&self, index: usize) -> &[u8] {
        if index == 0 {
            &self.direct
        } else {
            &self.indirect[index - 1]
        }
    }

    fn block_mut(&mut self, index: usize) -> &mut [u8] {
        if index == 0 {
            &mut self.direct
        } else {
            &mut self.indirect[index - 1]
        }
    }

    /// Make sure blocks exist for the first `capacity` bytes. Nothing is
    /// allocated when the request cannot be satisfied.
    fn ensure_capacity(&mut self, capacity: u64) -> Result<()> {
        let required = blocks_required(capacity);
        if required > MAX_BLOCKS as u64 {
            warn!(
                "refusing to grow contents to {capacity} bytes: {required} blocks required, limit is {MAX_BLOCKS}"
            );
            return Err(ContentsError::CapacityExceeded {
                required_blocks: required,
                max_blocks: MAX_BLOCKS as u64,
            });
        }
        let required = required as usize;
        if required <= self.allocated() {
            return Ok(());
        }

        if self.indirect.capacity() == 0 {
            self.indirect.reserve_exact(MAX_INDIRECT_BLOCKS);
            debug!("allocated indirect block table ({MAX_INDIRECT_BLOCKS} entries)");
        }
        let before = self.allocated();
        while self.allocated() < required {
            self.indirect.push(zeroed_block());
        }
        debug!("grew contents from {before} to {required} blocks");
        Ok(())
    }

    fn copy_out(&self, position: u64, dst: &mut [u8]) {
        let mut cursor = 0;
        for span in block_spans(position, dst.len()) {
            let block = self.block(span.block_index);
            dst[cursor..cursor + span.len]
                .copy_from_slice(&block[span.offset_in_block..span.offset_in_block + span.len]);
            cursor += span.len;
        }
    }

    fn copy_in(&mut self, position: u64, src: &[u8]) {
        let mut cursor = 0;
        for span in block_spans(position, src.len()) {
            let block = self.block_mut(span.block_index);
            block[span.offset_in_block..span.offset_in_block + span.len]
                .copy_from_slice(&src[cursor..cursor + span.len]);
            cursor += span.len;
        }
    }

    /// Zero `[from, to)`. Both ends must lie inside allocated blocks.
    fn zero_fill(&mut self, from: u64, to: u64) {
        if from >= to {
            return;
        }
        for span in block_spans(from, (to - from) as usize) {
            self.block_mut(span.block_index)[span.offset_in_block..span.offset_in_block + span.len]
                .fill(0);
        }
    }

    fn read_at(&self, dst: &mut [u8], position: u64, max_transfer: usize) -> Option<usize> {
        if position >= self.size {
            return None;
        }
        let to_read = usize::try_from(self.size - position)
            .map_or(dst.len(), |available| available.min(dst.len()));
        let mut done = 0;
        for chunk in dst[..to_read].chunks_mut(max_transfer) {
            self.copy_out(position + done as u64, chunk);
            done += chunk.len();
        }
        Some(done)
    }

    fn write_at(&mut self, src: &[u8], position: u64, max_transfer: usize) -> Result<usize> {
        let end = position
            .checked_add(src.len() as u64)
            .ok_or(ContentsError::PositionOverflow {
                position,
                len: src.len() as u64,
            })?;
        self.ensure_capacity(end)?;

        // Bytes between the current end and the write may be left over from
        // before a truncate.
        if position > self.size {
            self.zero_fill(self.size, position.min(self.high_water));
        }

        let mut written = 0;
        for chunk in src.chunks(max_transfer) {
            self.copy_in(position + written as u64, chunk);
            written += chunk.len();
        }

        self.size = self.size.max(end);
        self.high_water = self.high_water.max(end);
        Ok(written)
    }
}

impl MemoryContents {
    /// Empty contents with only the direct block allocated.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(Blocks::with_blocks(1)),
            max_transfer: ContentsConfig::default().max_transfer,
        }
    }

    /// Empty contents with `initial_blocks` blocks allocated up front, for
    /// materializing content whose length is already known.
    pub fn with_initial_blocks(initial_blocks: usize) -> Result<Self> {
        Self::with_config(&ContentsConfig {
            initial_blocks,
            ..ContentsConfig::default()
        })
    }

    pub fn with_config(config: &ContentsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            blocks: RwLock::new(Blocks::with_blocks(config.initial_blocks)),
            max_transfer: config.max_transfer,
        })
    }

    /// Independent copy of `other`, sized to exactly the blocks its content
    /// needs.
    pub fn copy_of(other: &MemoryContents) -> Result<Self> {
        let source = other.blocks.read();
        let required = blocks_required(source.size) as usize;
        let copy = Self::with_config(&ContentsConfig {
            initial_blocks: required,
            max_transfer: other.max_transfer,
        })?;
        {
            let mut target = copy.blocks.write();
            for span in block_spans(0, source.size as usize) {
                let range = span.offset_in_block..span.offset_in_block + span.len;
                target.block_mut(span.block_index)[range.clone()]
                    .copy_from_slice(&source.block(span.block_index)[range]);
            }
            target.size = source.size;
            target.high_water = source.size;
        }
        Ok(copy)
    }

    /// Logical length in bytes.
    pub fn size(&self) -> u64 {
        self.blocks.read().size
    }

    /// Physically allocated blocks, direct block included.
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.read().allocated()
    }

    /// Copy bytes starting at `position` into `dst`.
    ///
    /// Returns `None` when `position` is at or past the end, otherwise the
    /// number of bytes copied, which is `dst.len()` unless the end of the
    /// content comes first.
    pub fn read_at(&self, dst: &mut [u8], position: u64) -> Option<usize> {
        self.blocks.read().read_at(dst, position, self.max_transfer)
    }

    /// Write all of `src` at `position`, growing the contents as needed.
    ///
    /// A gap between the current end and `position` reads back as zeros.
    /// On error nothing has been written and the size is unchanged.
    pub fn write_at(&self, src: &[u8], position: u64) -> Result<usize> {
        self.blocks.write().write_at(src, position, self.max_transfer)
    }

    /// Write all of `src` at the current end as one atomic step.
    pub fn write_at_end(&self, src: &[u8]) -> Result<usize> {
        self.append(src).map(|_| src.len())
    }

    /// Like [`write_at_end`](Self::write_at_end) but returns the offset the
    /// bytes landed at.
    pub(crate) fn append(&self, src: &[u8]) -> Result<u64> {
        let mut blocks = self.blocks.write();
        let position = blocks.size;
        blocks.write_at(src, position, self.max_transfer)?;
        Ok(position)
    }

    /// Shrink the logical size to `new_size`. Never grows.
    pub fn truncate(&self, new_size: u64) {
        let mut blocks = self.blocks.write();
        if new_size < blocks.size {
            trace!("truncating contents from {} to {new_size} bytes", blocks.size);
            blocks.size = new_size;
        }
    }

    /// Snapshot of the logical content.
    pub fn to_vec(&self) -> Vec<u8> {
        let blocks = self.blocks.read();
        let mut out = vec![0u8; blocks.size as usize];
        blocks.copy_out(0, &mut out);
        out
    }

    /// Forward-only reader starting at offset 0.
    pub fn new_reader(&self) -> ContentsReader<'_> {
        ContentsReader::new(self)
    }

    /// Seekable channel starting at offset 0.
    pub fn new_channel(&self, readable: bool, writable: bool) -> BlockChannel<'_> {
        BlockChannel::new(self, readable, writable)
    }

    /// Channel whose writes always land at the current end. Its position
    /// starts at the size observed now.
    pub fn new_append_channel(&self, readable: bool) -> AppendingBlockChannel<'_> {
        AppendingBlockChannel::new(self, readable, self.size())
    }
}

impl Default for MemoryContents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blocks = self.blocks.read();
        f.debug_struct("MemoryContents")
            .field("size", &blocks.size)
            .field("allocated_blocks", &blocks.allocated())
            .field("max_transfer", &self.max_transfer)
            .finish()
    }
}
