//! File contents (contents)
//!
//! Responsibilities:
//! - Hold one file's bytes in fixed-size blocks: a direct block plus a
//!   lazily allocated table of indirect blocks.
//! - Translate byte offsets into block-local spans for reads and writes.
//! - Keep content and size coherent under concurrent readers and writers
//!   with a single reader/writer lock per file.
//! - Hand out independent views: a forward-only reader, a seekable channel
//!   and an append channel.
//!
//! Submodules:
//! - `layout`: block geometry and address translation
//! - `store`: the block store itself
//! - `reader`: forward-only byte stream
//! - `channel`: seekable and appending channels
pub mod channel;
pub mod layout;
pub mod reader;
pub mod store;

pub use channel::{AppendingBlockChannel, BlockChannel, SeekableChannel};
pub use reader::ContentsReader;
pub use store::MemoryContents;
