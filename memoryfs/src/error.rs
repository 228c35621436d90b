use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContentsError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentsError {
    #[error("file too large: {required_blocks} blocks required, at most {max_blocks} addressable")]
    CapacityExceeded {
        required_blocks: u64,
        max_blocks: u64,
    },

    #[error("position {position} plus {len} bytes overflows the file offset range")]
    PositionOverflow { position: u64, len: u64 },

    #[error("channel is not readable")]
    NotReadable,

    #[error("channel is not writable")]
    NotWritable,

    #[error("channel is closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ContentsError {
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

impl From<ContentsError> for io::Error {
    fn from(err: ContentsError) -> Self {
        let kind = match err {
            ContentsError::NotReadable | ContentsError::NotWritable => {
                io::ErrorKind::PermissionDenied
            }
            ContentsError::PositionOverflow { .. } | ContentsError::InvalidConfig(_) => {
                io::ErrorKind::InvalidInput
            }
            ContentsError::CapacityExceeded { .. } | ContentsError::Closed => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
