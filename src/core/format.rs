// Data structures for the LD format

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::core::constants::*;
use crate::core::data_log::DataLog;
use crate::core::error::{LdError, Result};

/// Numeric encoding of a channel's sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    Int16,
    Int32,
    Float16,
    Float32,
}

impl DataType {
    /// Resolve the `(dtype_a, dtype)` pair stored in a channel record.
    /// `dtype_a == 0x07` is the float family, anything else signed integers;
    /// `dtype` gives the width in bytes.
    pub fn from_discriminator(dtype_a: u16, dtype: u16) -> Result<Self> {
        match (dtype_a == DTYPE_A_FLOAT, dtype) {
            (true, DTYPE_WIDTH_16) => Ok(DataType::Float16),
            (true, DTYPE_WIDTH_32) => Ok(DataType::Float32),
            (false, DTYPE_WIDTH_16) => Ok(DataType::Int16),
            (false, DTYPE_WIDTH_32) => Ok(DataType::Int32),
            _ => Err(LdError::UnsupportedDataType { dtype_a, dtype }),
        }
    }

    pub fn discriminator(self) -> (u16, u16) {
        match self {
            DataType::Int16 => (DTYPE_A_INT, DTYPE_WIDTH_16),
            DataType::Int32 => (DTYPE_A_INT, DTYPE_WIDTH_32),
            DataType::Float16 => (DTYPE_A_FLOAT, DTYPE_WIDTH_16),
            DataType::Float32 => (DTYPE_A_FLOAT, DTYPE_WIDTH_32),
        }
    }

    pub fn width(self) -> usize {
        match self {
            DataType::Int16 | DataType::Float16 => 2,
            DataType::Int32 | DataType::Float32 => 4,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int16 => write!(f, "int16"),
            DataType::Int32 => write!(f, "int32"),
            DataType::Float16 => write!(f, "float16"),
            DataType::Float32 => write!(f, "float32"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LdVehicle {
    pub id: String,
    pub weight: u32,
    pub vehicle_type: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LdVenue {
    pub name: String,
    pub vehicle_ptr: u16,
    pub vehicle: Option<LdVehicle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LdEvent {
    pub name: String,
    pub session: String,
    pub comment: String,
    pub venue_ptr: u16,
    pub venue: Option<LdVenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LdHeader {
    pub meta_ptr: u32,
    pub data_ptr: u32,
    pub event_ptr: u32,
    pub event: Option<LdEvent>,
    pub device_serial: u32,
    pub device_type: String,
    pub device_version: u16,
    pub channel_count: u32,
    pub driver: String,
    pub vehicle_id: String,
    pub venue: String,
    pub datetime: Option<NaiveDateTime>,
    pub short_comment: String,
}

impl fmt::Display for LdHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let datetime = self
            .datetime
            .map(|dt| dt.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "driver: {}\nvehicleid: {}\nvenue: {}\nevent: {}\nsession: {}\ndatetime: {}\nshort_comment: {}",
            self.driver,
            self.vehicle_id,
            self.venue,
            self.event.as_ref().map_or("", |e| e.name.as_str()),
            self.event.as_ref().map_or("", |e| e.session.as_str()),
            datetime,
            self.short_comment,
        )
    }
}

/// One record of the channel metadata chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMeta {
    /// Offset this record was read from (or is written to).
    pub meta_ptr: u32,
    pub prev_meta_ptr: u32,
    pub next_meta_ptr: u32,
    pub data_ptr: u32,
    pub sample_count: u32,
    pub dtype: DataType,
    pub freq: u16,
    pub shift: i16,
    pub mul: i16,
    pub scale: i16,
    pub dec: i16,
    pub name: String,
    pub short_name: String,
    pub unit: String,
}

impl ChannelMeta {
    pub fn data_len(&self) -> usize {
        self.sample_count as usize * self.dtype.width()
    }
}

/// A decoded channel: its metadata record plus the raw sample values
/// converted to `f64`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LdChannel {
    pub meta: ChannelMeta,
    pub samples: Vec<f64>,
}

impl LdChannel {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn unit(&self) -> &str {
        &self.meta.unit
    }

    /// Samples with the record's display conversion applied:
    /// `(raw / scale * 10^-dec + shift) * mul`. A zero scale leaves the
    /// division out.
    pub fn scaled_samples(&self) -> Vec<f64> {
        let scale = if self.meta.scale == 0 { 1.0 } else { self.meta.scale as f64 };
        let dec = 10f64.powi(-(self.meta.dec as i32));
        let shift = self.meta.shift as f64;
        let mul = self.meta.mul as f64;
        self.samples
            .iter()
            .map(|raw| (raw / scale * dec + shift) * mul)
            .collect()
    }
}

impl fmt::Display for LdChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chan {} ({}) [{}], {} Hz, {} samples, {}",
            self.meta.name,
            self.meta.short_name,
            self.meta.unit,
            self.meta.freq,
            self.meta.sample_count,
            self.meta.dtype,
        )
    }
}

/// A decoded LD file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LdFile {
    pub header: LdHeader,
    pub channels: Vec<LdChannel>,
}

impl LdFile {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, name: &str) -> Option<&LdChannel> {
        self.channels.iter().find(|c| c.meta.name == name)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(LdChannel::name).collect()
    }

    /// Rebuild a time-series model. The file carries no per-sample
    /// timestamps, so sample `i` is placed at `i / freq`; channels without a
    /// rate hint use the sample index.
    pub fn to_data_log(&self, name: &str) -> DataLog {
        let mut log = DataLog::new(name);
        for chan in &self.channels {
            let decimals = i32::from(chan.meta.dec);
            let target = log.add_channel(chan.meta.name.as_str(), chan.meta.unit.as_str(), decimals);
            let period = if chan.meta.freq > 0 {
                1.0 / f64::from(chan.meta.freq)
            } else {
                1.0
            };
            for (i, value) in chan.samples.iter().enumerate() {
                target.append_sample(i as f64 * period, *value);
            }
        }
        log
    }
}
