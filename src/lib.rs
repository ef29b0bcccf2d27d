// MoTeC LD log generator and parser
// Main library entry point

pub mod convert;
pub mod core;
pub mod ingest;
pub mod models;
pub mod utils;

// Re-export main types
pub use crate::core::data_log::{Channel, DataLog, Sample};
pub use crate::core::error::{LdError, Result};
pub use crate::core::format::{ChannelMeta, DataType, LdChannel, LdEvent, LdFile, LdHeader, LdVehicle, LdVenue};
pub use crate::core::reader::{decode, read_ld_file, LdReader};
pub use crate::core::writer::{encode, LdAssembler};
pub use convert::{convert, ConversionRequest, ConversionSummary};
pub use ingest::{ingest, IngestStats, LogType};
pub use models::metadata::LogMetadata;
