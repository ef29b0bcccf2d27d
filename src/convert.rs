// Log file → LD file conversion

use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

use crate::core::error::{LdError, Result};
use crate::core::writer::LdAssembler;
use crate::ingest::{ingest, IngestStats, LogType};
use crate::models::metadata::LogMetadata;
use crate::utils::conf_helper::output_path;

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub log_path: PathBuf,
    pub log_type: LogType,
    pub output: Option<PathBuf>,
    /// Resample every channel to this rate before writing.
    pub frequency: Option<f64>,
    pub dbc_path: Option<PathBuf>,
    pub metadata: LogMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub output: PathBuf,
    pub channel_count: usize,
    pub duration: f64,
    pub stats: IngestStats,
}

/// Read the source log and write it out as an LD file. Nothing is written
/// unless the whole conversion succeeds.
pub fn convert(request: &ConversionRequest) -> Result<ConversionSummary> {
    info!("Loading log...");
    let file = File::open(&request.log_path)?;
    let (mut data_log, stats) = ingest(
        request.log_type,
        BufReader::new(file),
        request.dbc_path.as_deref(),
    )?;

    if data_log.channel_count() == 0 {
        return Err(LdError::NoChannelsFound);
    }

    info!(
        "Parsed {:.1}s log with {} channels:",
        data_log.duration(),
        data_log.channel_count()
    );
    for channel in data_log.channels() {
        info!(
            "    Channel: {}, Units: {}, Decimals: {}, Messages: {}, Frequency: {:.2} Hz",
            channel.name,
            channel.units,
            channel.decimals,
            channel.len(),
            channel.avg_frequency()
        );
    }
    if stats.skipped_lines > 0 || stats.skipped_values > 0 {
        info!(
            "Skipped {} lines and {} values that were not numeric",
            stats.skipped_lines, stats.skipped_values
        );
    }

    if let Some(frequency) = request.frequency {
        info!("Resampling to {} Hz...", frequency);
        data_log.resample(frequency)?;
    }

    info!("Converting to MoTeC log...");
    let mut assembler = LdAssembler::new(&request.metadata);
    assembler.add_all_channels(&data_log)?;

    let output = output_path(&request.log_path, request.output.as_deref());
    info!("Saving MoTeC log to {}...", output.display());
    assembler.write_file(&output)?;

    Ok(ConversionSummary {
        output,
        channel_count: data_log.channel_count(),
        duration: data_log.duration(),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::read_ld_file;
    use std::fs;

    fn request(dir: &std::path::Path, contents: &str, log_type: LogType) -> ConversionRequest {
        let log_path = dir.join("session.csv");
        fs::write(&log_path, contents).unwrap();
        ConversionRequest {
            log_path,
            log_type,
            output: None,
            frequency: None,
            dbc_path: None,
            metadata: LogMetadata {
                driver: "Pat".to_string(),
                ..LogMetadata::default()
            },
        }
    }

    #[test]
    fn test_convert_csv() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "t,rpm,speed\ns,rpm,km/h\n0,900,0\n0.5,1500,3\n1,2100,7\n", LogType::Csv);

        let summary = convert(&req).unwrap();
        assert_eq!(summary.output, dir.path().join("session.ld"));
        assert_eq!(summary.channel_count, 2);
        assert_eq!(summary.duration, 1.0);

        let file = read_ld_file(&summary.output).unwrap();
        assert_eq!(file.header.driver, "Pat");
        let speed = file.channel("speed").unwrap();
        assert_eq!(speed.unit(), "km/h");
        assert_eq!(speed.meta.freq, 2);
        assert_eq!(speed.samples, vec![0.0, 3.0, 7.0]);
    }

    #[test]
    fn test_convert_with_resample() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), "t,a\ns,V\n0,0\n1,10\n", LogType::Csv);
        req.frequency = Some(4.0);
        req.output = Some(dir.path().join("nested").join("resampled.csv"));

        let summary = convert(&req).unwrap();
        assert_eq!(summary.output, dir.path().join("nested").join("resampled.ld"));

        let file = read_ld_file(&summary.output).unwrap();
        let chan = file.channel("a").unwrap();
        assert_eq!(chan.samples, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(chan.meta.freq, 4);
    }

    #[test]
    fn test_no_channels_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "time\ns\n0\n1\n", LogType::Csv);

        assert!(matches!(convert(&req), Err(LdError::NoChannelsFound)));
        assert!(!dir.path().join("session.ld").exists());
    }

    #[test]
    fn test_unsupported_log_type_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "t,a\ns,V\n0,1\n", LogType::Accessport);

        assert!(matches!(
            convert(&req),
            Err(LdError::UnsupportedLogType(LogType::Accessport))
        ));
        assert!(!dir.path().join("session.ld").exists());
    }

    #[test]
    fn test_oversized_resample_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), "t,a\ns,V\n0,1\n1,2\n", LogType::Csv);
        req.frequency = Some(1e300);

        assert!(matches!(convert(&req), Err(LdError::OffsetOverflow(_))));
        assert!(!dir.path().join("session.ld").exists());
    }
}
