pub mod binary;
pub mod constants;
pub mod data_log;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;
