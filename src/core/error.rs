// Error handling for the LD codec and log ingestion

use thiserror::Error;

use crate::ingest::LogType;

pub type Result<T> = std::result::Result<T, LdError>;

#[derive(Error, Debug)]
pub enum LdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Allocation failed: could not reserve {requested} bytes")]
    AllocationFailure { requested: usize },

    #[error("Truncated input: not enough bytes for {field}")]
    TruncatedInput { field: &'static str },

    #[error("Corrupt channel chain at offset {offset:#x}: {reason}")]
    CorruptChain { offset: u32, reason: String },

    #[error("Unsupported data type: dtype_a={dtype_a:#x}, dtype={dtype}")]
    UnsupportedDataType { dtype_a: u16, dtype: u16 },

    #[error("Offset overflow while laying out {0}")]
    OffsetOverflow(&'static str),

    #[error("Unsupported log type: {0}")]
    UnsupportedLogType(LogType),

    #[error("No channels found in log data")]
    NoChannelsFound,

    #[error("Config error: {0}")]
    Config(String),
}

impl LdError {
    /// Map a failed fixed-width read onto the codec taxonomy.
    ///
    /// Running out of input is `TruncatedInput`; every other IO failure
    /// stays an `Io` error.
    pub(crate) fn from_read(err: std::io::Error, field: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            LdError::TruncatedInput { field }
        } else {
            LdError::Io(err)
        }
    }
}
