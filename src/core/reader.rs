// LD file reader: header, event/venue/vehicle chain, channel chain, samples

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDateTime;
use half::f16;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

use crate::core::binary::*;
use crate::core::constants::*;
use crate::core::error::{LdError, Result};
use crate::core::format::*;

/// Decode a complete LD file held in memory.
pub fn decode(bytes: &[u8]) -> Result<LdFile> {
    LdReader::from_reader(Cursor::new(bytes))?.read_file()
}

/// Open and decode an LD file from disk.
pub fn read_ld_file<P: AsRef<Path>>(path: P) -> Result<LdFile> {
    LdReader::open(path)?.read_file()
}

pub struct LdReader<R> {
    inner: R,
    len: u64,
}

impl LdReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> LdReader<R> {
    pub fn from_reader(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }

    pub fn read_file(&mut self) -> Result<LdFile> {
        let header = self.read_header()?;

        // First pass establishes the channel count, second pass decodes.
        let offsets = self.walk_chain(header.meta_ptr)?;
        if offsets.len() != header.channel_count as usize {
            debug!(
                "header declares {} channels, chain holds {}",
                header.channel_count,
                offsets.len()
            );
        }

        let mut channels = Vec::new();
        channels
            .try_reserve_exact(offsets.len())
            .map_err(|_| LdError::AllocationFailure {
                requested: offsets.len() * std::mem::size_of::<LdChannel>(),
            })?;

        for offset in offsets {
            let meta = self.read_channel_meta(offset)?;
            let samples = self.read_samples(&meta)?;
            debug!(
                "channel '{}' at {:#x}: {} x {} at {:#x}",
                meta.name, meta.meta_ptr, meta.sample_count, meta.dtype, meta.data_ptr
            );
            channels.push(LdChannel { meta, samples });
        }

        Ok(LdFile { header, channels })
    }

    fn read_header(&mut self) -> Result<LdHeader> {
        let r = &mut self.inner;
        r.seek(SeekFrom::Start(0))?;

        let marker = read_u32(r, "ld_marker")?;
        if marker != HEADER_MARKER {
            warn!("unexpected LD marker {:#x}", marker);
        }
        skip(r, 4)?;
        let meta_ptr = read_u32(r, "meta_ptr")?;
        let data_ptr = read_u32(r, "data_ptr")?;
        skip(r, 20)?;
        let event_ptr = read_u32(r, "event_ptr")?;
        skip(r, 24)?;
        skip(r, 6)?;
        let device_serial = read_u32(r, "device_serial")?;
        let device_type = read_string(r, DEVICE_TYPE_LEN, "device_type")?;
        let device_version = read_u16(r, "device_version")?;
        skip(r, 2)?;
        let channel_count = read_u32(r, "channel_count")?;
        skip(r, 4)?;
        let date = read_string(r, DATE_LEN, "date")?;
        skip(r, 16)?;
        let time = read_string(r, DATE_LEN, "time")?;
        skip(r, 16)?;
        let driver = read_string(r, NAME_LEN, "driver")?;
        let vehicle_id = read_string(r, NAME_LEN, "vehicle_id")?;
        skip(r, 64)?;
        let venue = read_string(r, NAME_LEN, "venue")?;
        skip(r, 64 + 1024)?;
        skip(r, 4)?; // pro logging flag
        skip(r, 66)?;
        let short_comment = read_string(r, NAME_LEN, "short_comment")?;

        let event = if event_ptr > 0 {
            Some(self.read_event(event_ptr)?)
        } else {
            None
        };

        Ok(LdHeader {
            meta_ptr,
            data_ptr,
            event_ptr,
            event,
            device_serial,
            device_type,
            device_version,
            channel_count,
            driver,
            vehicle_id,
            venue,
            datetime: parse_datetime(&date, &time),
            short_comment,
        })
    }

    fn read_event(&mut self, offset: u32) -> Result<LdEvent> {
        let pos = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(offset as u64))?;

        let r = &mut self.inner;
        let name = read_string(r, NAME_LEN, "event.name")?;
        let session = read_string(r, NAME_LEN, "event.session")?;
        let comment = read_string(r, LONG_COMMENT_LEN, "event.comment")?;
        let venue_ptr = read_u16(r, "event.venue_ptr")?;

        let venue = if venue_ptr > 0 {
            Some(self.read_venue(venue_ptr)?)
        } else {
            None
        };

        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(LdEvent {
            name,
            session,
            comment,
            venue_ptr,
            venue,
        })
    }

    fn read_venue(&mut self, offset: u16) -> Result<LdVenue> {
        let pos = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(offset as u64))?;

        let r = &mut self.inner;
        let name = read_string(r, NAME_LEN, "venue.name")?;
        skip(r, 1034)?;
        let vehicle_ptr = read_u16(r, "venue.vehicle_ptr")?;

        let vehicle = if vehicle_ptr > 0 {
            Some(self.read_vehicle(vehicle_ptr)?)
        } else {
            None
        };

        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(LdVenue {
            name,
            vehicle_ptr,
            vehicle,
        })
    }

    fn read_vehicle(&mut self, offset: u16) -> Result<LdVehicle> {
        let pos = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(offset as u64))?;

        let r = &mut self.inner;
        let id = read_string(r, NAME_LEN, "vehicle.id")?;
        skip(r, 128)?;
        let weight = read_u32(r, "vehicle.weight")?;
        let vehicle_type = read_string(r, VEHICLE_TYPE_LEN, "vehicle.type")?;
        let comment = read_string(r, VEHICLE_COMMENT_LEN, "vehicle.comment")?;

        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(LdVehicle {
            id,
            weight,
            vehicle_type,
            comment,
        })
    }

    /// Follow the `next` references from `head` and collect every record
    /// offset. Stops at 0; a revisited offset or more records than the
    /// input can hold is a corrupt chain.
    fn walk_chain(&mut self, head: u32) -> Result<Vec<u32>> {
        let bound = MAX_CHANNELS.min((self.len / CHANNEL_META_SIZE as u64) as usize + 1);
        let mut offsets = Vec::new();
        let mut seen = HashSet::new();
        let mut ptr = head;

        while ptr != 0 {
            if !seen.insert(ptr) {
                return Err(LdError::CorruptChain {
                    offset: ptr,
                    reason: "reference revisited".to_string(),
                });
            }

            self.inner.seek(SeekFrom::Start(ptr as u64 + 4))?;
            let next = read_u32(&mut self.inner, "next_meta_ptr")?;

            offsets.push(ptr);
            if offsets.len() > bound {
                return Err(LdError::CorruptChain {
                    offset: ptr,
                    reason: format!("more than {} records", bound),
                });
            }
            ptr = next;
        }

        Ok(offsets)
    }

    fn read_channel_meta(&mut self, offset: u32) -> Result<ChannelMeta> {
        let r = &mut self.inner;
        r.seek(SeekFrom::Start(offset as u64))?;

        let prev_meta_ptr = read_u32(r, "prev_meta_ptr")?;
        let next_meta_ptr = read_u32(r, "next_meta_ptr")?;
        let data_ptr = read_u32(r, "data_ptr")?;
        let sample_count = read_u32(r, "sample_count")?;
        skip(r, 2)?; // record counter
        let dtype_a = read_u16(r, "dtype_a")?;
        let dtype = read_u16(r, "dtype")?;
        let freq = read_u16(r, "freq")?;
        let shift = read_i16(r, "shift")?;
        let mul = read_i16(r, "mul")?;
        let scale = read_i16(r, "scale")?;
        let dec = read_i16(r, "dec")?;
        let name = read_string(r, CHANNEL_NAME_LEN, "channel.name")?;
        let short_name = read_string(r, CHANNEL_SHORT_NAME_LEN, "channel.short_name")?;
        let unit = read_string(r, CHANNEL_UNIT_LEN, "channel.unit")?;

        Ok(ChannelMeta {
            meta_ptr: offset,
            prev_meta_ptr,
            next_meta_ptr,
            data_ptr,
            sample_count,
            dtype: DataType::from_discriminator(dtype_a, dtype)?,
            freq,
            shift,
            mul,
            scale,
            dec,
            name,
            short_name,
            unit,
        })
    }

    fn read_samples(&mut self, meta: &ChannelMeta) -> Result<Vec<f64>> {
        let width = meta.dtype.width();
        let len = (meta.sample_count as usize)
            .checked_mul(width)
            .ok_or(LdError::TruncatedInput { field: "sample buffer" })?;
        if meta.data_ptr as u64 + len as u64 > self.len {
            return Err(LdError::TruncatedInput { field: "sample buffer" });
        }

        let mut raw = Vec::new();
        raw.try_reserve_exact(len)
            .map_err(|_| LdError::AllocationFailure { requested: len })?;
        raw.resize(len, 0u8);

        self.inner.seek(SeekFrom::Start(meta.data_ptr as u64))?;
        self.inner
            .read_exact(&mut raw)
            .map_err(|e| LdError::from_read(e, "sample buffer"))?;

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(meta.sample_count as usize)
            .map_err(|_| LdError::AllocationFailure {
                requested: meta.sample_count as usize * std::mem::size_of::<f64>(),
            })?;

        let chunks = raw.chunks_exact(width);
        match meta.dtype {
            DataType::Int16 => samples.extend(chunks.map(|c| LittleEndian::read_i16(c) as f64)),
            DataType::Int32 => samples.extend(chunks.map(|c| LittleEndian::read_i32(c) as f64)),
            DataType::Float16 => {
                samples.extend(chunks.map(|c| f16::from_bits(LittleEndian::read_u16(c)).to_f64()))
            }
            DataType::Float32 => samples.extend(chunks.map(|c| LittleEndian::read_f32(c) as f64)),
        }

        Ok(samples)
    }
}

fn parse_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let text = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&text, &format!("{} {}", DATE_FORMAT, TIME_FORMAT))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&text, &format!("{} {}", DATE_FORMAT, TIME_FORMAT_SHORT))
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // Header with every pointer zeroed except the ones given.
    fn header_bytes(meta_ptr: u32, event_ptr: u32) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&HEADER_MARKER.to_le_bytes());
        buf[8..12].copy_from_slice(&meta_ptr.to_le_bytes());
        buf[36..40].copy_from_slice(&event_ptr.to_le_bytes());
        buf[74..77].copy_from_slice(b"ADL");
        buf[94..104].copy_from_slice(b"23/05/2021");
        buf[126..134].copy_from_slice(b"14:02:59");
        buf[158..163].copy_from_slice(b"Alice");
        buf[1572..1577].copy_from_slice(b"dyno ");
        buf
    }

    fn channel_record(prev: u32, next: u32, data_ptr: u32, count: u32, dtype_a: u16, dtype: u16) -> Vec<u8> {
        let mut rec = Vec::with_capacity(CHANNEL_META_SIZE as usize);
        for v in [prev, next, data_ptr, count] {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        for v in [CHANNEL_COUNTER_BASE, dtype_a, dtype, 50] {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0i16, 1, 1, 0] {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        rec.extend_from_slice(&encode_string("Oil Temp", CHANNEL_NAME_LEN));
        rec.extend_from_slice(&encode_string("OilT", CHANNEL_SHORT_NAME_LEN));
        rec.extend_from_slice(&encode_string("C", CHANNEL_UNIT_LEN));
        rec.resize(CHANNEL_META_SIZE as usize, 0);
        rec
    }

    fn place(buf: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
        if buf.len() < offset + bytes.len() {
            buf.resize(offset + bytes.len(), 0);
        }
        buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn test_header_fields() {
        let file = decode(&header_bytes(0, 0)).unwrap();
        assert_eq!(file.header.driver, "Alice");
        assert_eq!(file.header.short_comment, "dyno");
        assert_eq!(file.header.device_type, "ADL");
        assert_eq!(
            file.header.datetime,
            NaiveDate::from_ymd_opt(2021, 5, 23).and_then(|d| d.and_hms_opt(14, 2, 59))
        );
        assert!(file.header.event.is_none());
        assert_eq!(file.channel_count(), 0);
    }

    #[test]
    fn test_from_reader_rewinds() {
        let mut cursor = Cursor::new(header_bytes(0, 0));
        cursor.seek(SeekFrom::Start(500)).unwrap();

        let file = LdReader::from_reader(cursor).unwrap().read_file().unwrap();
        assert_eq!(file.header.driver, "Alice");
    }

    #[test]
    fn test_datetime_fallbacks() {
        assert_eq!(
            parse_datetime("01/02/2020", "10:30"),
            NaiveDate::from_ymd_opt(2020, 2, 1).and_then(|d| d.and_hms_opt(10, 30, 0))
        );
        assert_eq!(parse_datetime("", ""), None);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = header_bytes(0, 0);
        assert!(matches!(
            decode(&bytes[..200]),
            Err(LdError::TruncatedInput { field: "driver" })
        ));
        assert!(matches!(decode(&[]), Err(LdError::TruncatedInput { field: "ld_marker" })));
    }

    #[test]
    fn test_int16_channel() {
        let meta_at = HEADER_SIZE as u32;
        let data_at = meta_at + CHANNEL_META_SIZE;
        let mut buf = header_bytes(meta_at, 0);
        place(&mut buf, meta_at as usize, &channel_record(0, 0, data_at, 3, 0x00, 2));
        let mut data = Vec::new();
        for v in [-5i16, 0, 1200] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        place(&mut buf, data_at as usize, &data);

        let file = decode(&buf).unwrap();
        let chan = &file.channels[0];
        assert_eq!(chan.name(), "Oil Temp");
        assert_eq!(chan.meta.short_name, "OilT");
        assert_eq!(chan.unit(), "C");
        assert_eq!(chan.meta.freq, 50);
        assert_eq!(chan.meta.dtype, DataType::Int16);
        assert_eq!(chan.samples, vec![-5.0, 0.0, 1200.0]);
    }

    #[test]
    fn test_int32_and_float16_channels() {
        let first = HEADER_SIZE as u32;
        let second = first + CHANNEL_META_SIZE;
        let data_a = second + CHANNEL_META_SIZE;
        let data_b = data_a + 8;

        let mut buf = header_bytes(first, 0);
        place(&mut buf, first as usize, &channel_record(0, second, data_a, 2, 0x03, 4));
        place(&mut buf, second as usize, &channel_record(first, 0, data_b, 2, 0x07, 2));

        let mut data = Vec::new();
        data.extend_from_slice(&(-100_000i32).to_le_bytes());
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(&f16::from_f32(1.5).to_bits().to_le_bytes());
        data.extend_from_slice(&f16::from_f32(-0.5).to_bits().to_le_bytes());
        place(&mut buf, data_a as usize, &data);

        let file = decode(&buf).unwrap();
        assert_eq!(file.channel_count(), 2);
        assert_eq!(file.channels[0].samples, vec![-100_000.0, 7.0]);
        assert_eq!(file.channels[1].meta.dtype, DataType::Float16);
        assert_eq!(file.channels[1].samples, vec![1.5, -0.5]);
        assert_eq!(file.channels[1].meta.prev_meta_ptr, first);
    }

    #[test]
    fn test_self_referencing_chain() {
        let meta_at = HEADER_SIZE as u32;
        let mut buf = header_bytes(meta_at, 0);
        place(&mut buf, meta_at as usize, &channel_record(0, meta_at, 0, 0, 0x07, 4));

        assert!(matches!(
            decode(&buf),
            Err(LdError::CorruptChain { offset, .. }) if offset == meta_at
        ));
    }

    #[test]
    fn test_two_node_cycle() {
        let a = HEADER_SIZE as u32;
        let b = a + CHANNEL_META_SIZE;
        let mut buf = header_bytes(a, 0);
        place(&mut buf, a as usize, &channel_record(0, b, 0, 0, 0x07, 4));
        place(&mut buf, b as usize, &channel_record(a, a, 0, 0, 0x07, 4));

        assert!(matches!(decode(&buf), Err(LdError::CorruptChain { .. })));
    }

    #[test]
    fn test_chain_past_end_is_truncated() {
        let mut buf = header_bytes(50_000, 0);
        buf.resize(HEADER_SIZE, 0);
        assert!(matches!(
            decode(&buf),
            Err(LdError::TruncatedInput { field: "next_meta_ptr" })
        ));
    }

    #[test]
    fn test_sample_buffer_past_end() {
        let meta_at = HEADER_SIZE as u32;
        let mut buf = header_bytes(meta_at, 0);
        place(&mut buf, meta_at as usize, &channel_record(0, 0, meta_at + CHANNEL_META_SIZE, 1_000_000, 0x07, 4));

        assert!(matches!(
            decode(&buf),
            Err(LdError::TruncatedInput { field: "sample buffer" })
        ));
    }

    #[test]
    fn test_unknown_dtype() {
        let meta_at = HEADER_SIZE as u32;
        let mut buf = header_bytes(meta_at, 0);
        place(&mut buf, meta_at as usize, &channel_record(0, 0, 0, 0, 0x07, 3));

        assert!(matches!(
            decode(&buf),
            Err(LdError::UnsupportedDataType { dtype_a: 7, dtype: 3 })
        ));
    }

    #[test]
    fn test_event_without_venue() {
        let event_at = HEADER_SIZE as u32;
        let mut buf = header_bytes(0, event_at);
        let mut event = Vec::new();
        event.extend_from_slice(&encode_string("Club Day", NAME_LEN));
        event.extend_from_slice(&encode_string("Practice 1", NAME_LEN));
        event.extend_from_slice(&encode_string("wet track", LONG_COMMENT_LEN));
        event.extend_from_slice(&0u16.to_le_bytes());
        place(&mut buf, event_at as usize, &event);

        let file = decode(&buf).unwrap();
        let event = file.header.event.unwrap();
        assert_eq!(event.name, "Club Day");
        assert_eq!(event.session, "Practice 1");
        assert_eq!(event.comment, "wet track");
        assert!(event.venue.is_none());
    }
}
