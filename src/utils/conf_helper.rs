use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::error::{LdError, Result};
use crate::models::metadata::LogMetadata;

/// Load a metadata bundle from a JSON file. Missing keys keep their
/// defaults.
pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<LogMetadata> {
    let path = path.as_ref();

    let data = fs::read_to_string(path)
        .map_err(|e| LdError::Config(format!("File read Error: {e} {}", path.display())))?;

    let metadata: LogMetadata = serde_json::from_str(&data)
        .map_err(|e| LdError::Config(format!("JSON Parse Error: {e}")))?;

    info!("Metadata loaded from {}", path.display());
    Ok(metadata)
}

/// Output file for a conversion: the explicit output path or the input
/// path, with its extension replaced by `.ld`.
pub fn output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    output.unwrap_or(input).with_extension("ld")
}
