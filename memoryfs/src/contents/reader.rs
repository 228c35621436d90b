//! ContentsReader: forward-only byte stream over a [`MemoryContents`].

use std::io;

use tracing::trace;

use super::store::MemoryContents;
use crate::error::{ContentsError, Result};

/// Reads from offset 0 to the end exactly once. Open a new reader to start
/// over.
///
/// The reader holds no lock between calls; each read locks the contents for
/// its own duration only.
#[derive(Debug)]
pub struct ContentsReader<'a> {
    contents: &'a MemoryContents,
    position: u64,
    open: bool,
}

impl<'a> ContentsReader<'a> {
    pub(crate) fn new(contents: &'a MemoryContents) -> Self {
        trace!("opened contents reader");
        Self {
            contents,
            position: 0,
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

    /// Read the next bytes into `dst`. `None` means the stream is exhausted.
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<Option<usize>> {
        self.ensure_open()?;
        let read = self.contents.read_at(dst, self.position);
        if let Some(n) = read {
            self.position += n as u64;
        }
        Ok(read)
    }

    /// Bytes left before the current end of the contents.
    pub fn available(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.contents.size().saturating_sub(self.position))
    }

    /// Advance by up to `n` bytes without copying; returns how far it moved.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let skipped = self.available()?.min(n);
        self.position += skipped;
        Ok(skipped)
    }

    pub fn close(&mut self) {
        if self.open {
            trace!("closed contents reader at offset {}", self.position);
            self.open = false;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl io::Read for ContentsReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?.unwrap_or(0))
    }
}
