// Log ingestion: builds a DataLog from an external text log

pub mod csv;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use crate::core::data_log::DataLog;
use crate::core::error::{LdError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    Can,
    Csv,
    Accessport,
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogType::Can => write!(f, "CAN"),
            LogType::Csv => write!(f, "CSV"),
            LogType::Accessport => write!(f, "ACCESSPORT"),
        }
    }
}

impl FromStr for LogType {
    type Err = LdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CAN" => Ok(LogType::Can),
            "CSV" => Ok(LogType::Csv),
            "ACCESSPORT" => Ok(LogType::Accessport),
            other => Err(LdError::Config(format!("invalid log type: {}", other))),
        }
    }
}

/// Counters for cells dropped while ingesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub lines: usize,
    pub skipped_lines: usize,
    pub skipped_values: usize,
}

/// Read a log of the given type.
pub fn ingest<R: BufRead>(
    log_type: LogType,
    reader: R,
    dbc_path: Option<&Path>,
) -> Result<(DataLog, IngestStats)> {
    match log_type {
        LogType::Csv => csv::read_csv_log(reader),
        LogType::Can => read_can_log(reader, dbc_path),
        LogType::Accessport => read_accessport_log(reader),
    }
}

// CAN dumps need a DBC decoder, which is not available.
fn read_can_log<R: BufRead>(_reader: R, _dbc_path: Option<&Path>) -> Result<(DataLog, IngestStats)> {
    Err(LdError::UnsupportedLogType(LogType::Can))
}

fn read_accessport_log<R: BufRead>(_reader: R) -> Result<(DataLog, IngestStats)> {
    Err(LdError::UnsupportedLogType(LogType::Accessport))
}
