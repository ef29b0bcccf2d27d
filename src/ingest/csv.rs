// Tabular text log reader
//
// Line 1 holds column names, line 2 column units, then one row per
// timestamp. Column 0 is time, every other column becomes a channel.

use std::io::BufRead;
use tracing::debug;

use crate::core::data_log::DataLog;
use crate::core::error::Result;
use crate::ingest::IngestStats;

const CSV_DECIMALS: i32 = 3;

pub fn read_csv_log<R: BufRead>(reader: R) -> Result<(DataLog, IngestStats)> {
    let mut lines = reader.lines();
    let header = lines.next().transpose()?.unwrap_or_default();
    let units = lines.next().transpose()?.unwrap_or_default();

    let names: Vec<&str> = header.split(',').map(str::trim).collect();
    let units: Vec<&str> = units.split(',').map(str::trim).collect();

    let mut log = DataLog::new("");
    for (i, name) in names.iter().enumerate().skip(1) {
        let unit = units.get(i).copied().unwrap_or("");
        log.add_channel(*name, unit, CSV_DECIMALS);
    }

    let mut stats = IngestStats::default();
    for (line_no, line) in lines.enumerate() {
        let line = line?;
        stats.lines += 1;

        let mut cells = line.split(',');
        let timestamp = match cells.next().and_then(parse_number) {
            Some(t) => t,
            None => {
                debug!("line {}: non-numeric timestamp, skipped", line_no + 3);
                stats.skipped_lines += 1;
                continue;
            }
        };

        for channel in log.channels_mut() {
            match cells.next().and_then(parse_number) {
                Some(value) => channel.append_sample(timestamp, value),
                None => stats.skipped_values += 1,
            }
        }
    }

    Ok((log, stats))
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data_log::Sample;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn samples(log: &DataLog, name: &str) -> Vec<(f64, f64)> {
        log.channel(name)
            .unwrap()
            .samples()
            .iter()
            .map(|Sample { timestamp, value }| (*timestamp, *value))
            .collect()
    }

    #[test]
    fn test_bad_timestamp_drops_line() {
        let input = "t,a,b\ns,V,A\n0,1,2\n1,3,4\nx,5,6\n";
        let (log, stats) = read_csv_log(Cursor::new(input)).unwrap();

        assert_eq!(log.channel_count(), 2);
        assert_eq!(samples(&log, "a"), vec![(0.0, 1.0), (1.0, 3.0)]);
        assert_eq!(samples(&log, "b"), vec![(0.0, 2.0), (1.0, 4.0)]);
        assert_eq!(log.channel("a").unwrap().units, "V");
        assert_eq!(log.channel("b").unwrap().units, "A");
        assert_eq!(stats.skipped_lines, 1);
    }

    #[test]
    fn test_bad_value_skips_cell_only() {
        let input = "time, rpm , tps\ns,rpm,%\n0.0,1000,\n0.5,abc,12.5\n1.0, 1100 ,13\n";
        let (log, stats) = read_csv_log(Cursor::new(input)).unwrap();

        assert_eq!(samples(&log, "rpm"), vec![(0.0, 1000.0), (1.0, 1100.0)]);
        assert_eq!(samples(&log, "tps"), vec![(0.5, 12.5), (1.0, 13.0)]);
        assert_eq!(stats.skipped_values, 2);
        assert_eq!(stats.lines, 3);
    }

    #[test]
    fn test_missing_units_and_short_rows() {
        let input = "t,a,b\ns\r\n0,1\r\n";
        let (log, stats) = read_csv_log(Cursor::new(input)).unwrap();

        assert_eq!(log.channel("b").unwrap().units, "");
        assert_eq!(samples(&log, "a"), vec![(0.0, 1.0)]);
        assert!(log.channel("b").unwrap().is_empty());
        assert_eq!(stats.skipped_values, 1);
    }

    #[test]
    fn test_empty_input() {
        let (log, _) = read_csv_log(Cursor::new("")).unwrap();
        assert_eq!(log.channel_count(), 0);
    }
}
