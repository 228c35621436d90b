// In-memory file contents for a virtual file system: block storage plus the
// reader and channel views handed out to callers.

pub mod config;
pub mod contents;
pub mod error;

pub use config::ContentsConfig;
pub use contents::layout::{BLOCK_SIZE, MAX_BLOCKS, MAX_CAPACITY};
pub use contents::{
    AppendingBlockChannel, BlockChannel, ContentsReader, MemoryContents, SeekableChannel,
};
pub use error::{ContentsError, Result};
