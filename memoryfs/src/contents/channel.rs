//! Seekable channels over a [`MemoryContents`].
//!
//! [`BlockChannel`] writes at its own position. [`AppendingBlockChannel`]
//! reads like a [`BlockChannel`] but every write lands at the current end of
//! the contents, whatever its position says.

use std::io::{self, SeekFrom};

use tracing::trace;

use super::store::MemoryContents;
use crate::error::{ContentsError, Result};

/// Operations shared by both channel kinds.
///
/// Every operation on a closed channel fails with [`ContentsError::Closed`];
/// reads on a non-readable channel and writes or truncation on a
/// non-writable one fail with [`ContentsError::NotReadable`] and
/// [`ContentsError::NotWritable`].
pub trait SeekableChannel {
    /// Read at the current position and advance past the bytes read.
    /// `None` means the position is at or past the end.
    fn read_into(&mut self, dst: &mut [u8]) -> Result<Option<usize>>;

    /// Write all of `src` and advance past it.
    fn write_from(&mut self, src: &[u8]) -> Result<usize>;

    fn position(&self) -> Result<u64>;

    /// Any value is accepted; a position past the end makes reads return
    /// end-of-data and the next positional write leave a zero-filled gap.
    fn set_position(&mut self, position: u64) -> Result<()>;

    fn size(&self) -> Result<u64>;

    /// Shrink the contents to `size` and pull the position back to it when
    /// the position was further out.
    fn truncate(&mut self, size: u64) -> Result<()>;

    /// Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn is_readable(&self) -> bool;

    fn is_writable(&self) -> bool;
}

#[derive(Debug)]
struct ChannelState<'a> {
    contents: &'a MemoryContents,
    position: u64,
    readable: bool,
    writable: bool,
    open: bool,
}

impl<'a> ChannelState<'a> {
    fn new(contents: &'a MemoryContents, readable: bool, writable: bool, position: u64) -> Self {
        Self {
            contents,
            position,
            readable,
            writable,
            open: true,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(ContentsError::Closed)
        }
    }

    fn ensure_readable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.readable {
            return Err(ContentsError::NotReadable);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(ContentsError::NotWritable);
        }
        Ok(())
    }

    fn read_into(&mut self, dst: &mut [u8]) -> Result<Option<usize>> {
        self.ensure_readable()?;
        let read = self.contents.read_at(dst, self.position);
        if let Some(n) = read {
            self.position += n as u64;
        }
        Ok(read)
    }

    fn position(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.position)
    }

    fn set_position(&mut self, position: u64) -> Result<()> {
        self.ensure_open()?;
        self.position = position;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.contents.size())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.ensure_writable()?;
        self.contents.truncate(size);
        self.position = self.position.min(size);
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            trace!("closed channel at offset {}", self.position);
            self.open = false;
        }
    }
}

/// Random-access channel: reads and writes happen at its own position.
#[derive(Debug)]
pub struct BlockChannel<'a> {
    state: ChannelState<'a>,
}

impl<'a> BlockChannel<'a> {
    pub(crate) fn new(contents: &'a MemoryContents, readable: bool, writable: bool) -> Self {
        trace!("opened channel (readable: {readable}, writable: {writable})");
        Self {
            state: ChannelState::new(contents, readable, writable, 0),
        }
    }
}

/// Append channel: always writable, every write goes to the current end.
#[derive(Debug)]
pub struct AppendingBlockChannel<'a> {
    state: ChannelState<'a>,
}

impl<'a> AppendingBlockChannel<'a> {
    pub(crate) fn new(contents: &'a MemoryContents, readable: bool, position: u64) -> Self {
        trace!("opened append channel at offset {position} (readable: {readable})");
        Self {
            state: ChannelState::new(contents, readable, true, position),
        }
    }
}

impl SeekableChannel for BlockChannel<'_> {
    fn read_into(&mut self, dst: &mut [u8]) -> Result<Option<usize>> {
        self.state.read_into(dst)
    }

    fn write_from(&mut self, src: &[u8]) -> Result<usize> {
        self.state.ensure_writable()?;
        let written = self.state.contents.write_at(src, self.state.position)?;
        self.state.position += written as u64;
        Ok(written)
    }

    fn position(&self) -> Result<u64> {
        self.state.position()
    }

    fn set_position(&mut self, position: u64) -> Result<()> {
        self.state.set_position(position)
    }

    fn size(&self) -> Result<u64> {
        self.state.size()
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.state.truncate(size)
    }

    fn close(&mut self) {
        self.state.close()
    }

    fn is_open(&self) -> bool {
        self.state.open
    }

    fn is_readable(&self) -> bool {
        self.state.readable
    }

    fn is_writable(&self) -> bool {
        self.state.writable
    }
}

impl SeekableChannel for AppendingBlockChannel<'_> {
    fn read_into(&mut self, dst: &mut [u8]) -> Result<Option<usize>> {
        self.state.read_into(dst)
    }

    fn write_from(&mut self, src: &[u8]) -> Result<usize> {
        self.state.ensure_writable()?;
        // The end is decided inside the store's critical section, never from
        // our position.
        let start = self.state.contents.append(src)?;
        self.state.position = start + src.len() as u64;
        Ok(src.len())
    }

    fn position(&self) -> Result<u64> {
        self.state.position()
    }

    fn set_position(&mut self, position: u64) -> Result<()> {
        self.state.set_position(position)
    }

    fn size(&self) -> Result<u64> {
        self.state.size()
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.state.truncate(size)
    }

    fn close(&mut self) {
        self.state.close()
    }

    fn is_open(&self) -> bool {
        self.state.open
    }

    fn is_readable(&self) -> bool {
        self.state.readable
    }

    fn is_writable(&self) -> bool {
        self.state.writable
    }
}

macro_rules! impl_std_io {
    ($channel:ident) => {
        impl io::Read for $channel<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                Ok(SeekableChannel::read_into(self, buf)?.unwrap_or(0))
            }
        }

        impl io::Write for $channel<'_> {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(SeekableChannel::write_from(self, buf)?)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(self.state.ensure_open()?)
            }
        }

        impl io::Seek for $channel<'_> {
            fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
                let target = match pos {
                    SeekFrom::Start(offset) => Some(offset),
                    SeekFrom::Current(delta) => {
                        SeekableChannel::position(self)?.checked_add_signed(delta)
                    }
                    SeekFrom::End(delta) => SeekableChannel::size(self)?.checked_add_signed(delta),
                };
                let target = target.ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "invalid seek to a negative or overflowing position",
                    )
                })?;
                SeekableChannel::set_position(self, target)?;
                Ok(target)
            }
        }
    };
}

impl_std_io!(BlockChannel);
impl_std_io!(AppendingBlockChannel);
