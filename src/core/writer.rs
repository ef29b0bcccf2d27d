// LD file assembler: lays out every reference and serializes the file

use std::fs;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::binary::*;
use crate::core::constants::*;
use crate::core::data_log::{Channel, DataLog};
use crate::core::error::{LdError, Result};
use crate::core::format::*;
use crate::models::metadata::LogMetadata;

/// Encode a whole log into LD bytes.
pub fn encode(log: &DataLog, metadata: &LogMetadata) -> Result<Vec<u8>> {
    let mut assembler = LdAssembler::new(metadata);
    assembler.add_all_channels(log)?;

    let mut out = Cursor::new(Vec::new());
    assembler.write_to(&mut out)?;
    Ok(out.into_inner())
}

struct PendingChannel<'a> {
    meta: ChannelMeta,
    source: &'a Channel,
}

/// Builds the layout of one LD file from borrowed channels.
///
/// Channels are laid out in the order they are added. The metadata chain
/// starts at [`CHANNEL_META_PTR`] and the sample buffers follow the last
/// metadata record, so each added channel pushes every data reference
/// assigned so far forward by one record.
pub struct LdAssembler<'a> {
    header: LdHeader,
    channels: Vec<PendingChannel<'a>>,
}

impl<'a> LdAssembler<'a> {
    pub fn new(metadata: &LogMetadata) -> Self {
        let vehicle = LdVehicle {
            id: metadata.vehicle_id.clone(),
            weight: metadata.vehicle_weight,
            vehicle_type: metadata.vehicle_type.clone(),
            comment: metadata.vehicle_comment.clone(),
        };
        let venue = LdVenue {
            name: metadata.venue_name.clone(),
            vehicle_ptr: VEHICLE_PTR,
            vehicle: Some(vehicle),
        };
        let event = LdEvent {
            name: metadata.event_name.clone(),
            session: metadata.event_session.clone(),
            comment: metadata.long_comment.clone(),
            venue_ptr: VENUE_PTR,
            venue: Some(venue),
        };

        let header = LdHeader {
            meta_ptr: CHANNEL_META_PTR,
            data_ptr: CHANNEL_META_PTR,
            event_ptr: EVENT_PTR,
            event: Some(event),
            device_serial: DEVICE_SERIAL,
            device_type: DEVICE_TYPE.to_string(),
            device_version: DEVICE_VERSION,
            channel_count: 0,
            driver: metadata.driver.clone(),
            vehicle_id: metadata.vehicle_id.clone(),
            venue: metadata.venue_name.clone(),
            datetime: Some(metadata.datetime),
            short_comment: metadata.short_comment.clone(),
        };

        Self {
            header,
            channels: Vec::new(),
        }
    }

    pub fn header(&self) -> &LdHeader {
        &self.header
    }

    pub fn channel_metas(&self) -> impl Iterator<Item = &ChannelMeta> {
        self.channels.iter().map(|c| &c.meta)
    }

    pub fn add_channel(&mut self, channel: &'a Channel) -> Result<()> {
        let sample_count =
            u32::try_from(channel.len()).map_err(|_| LdError::OffsetOverflow("sample count"))?;
        let data_len = sample_count
            .checked_mul(DataType::Float32.width() as u32)
            .ok_or(LdError::OffsetOverflow("sample buffer"))?;

        // One more metadata record sits in front of the data region.
        self.header.data_ptr = self
            .header
            .data_ptr
            .checked_add(CHANNEL_META_SIZE)
            .ok_or(LdError::OffsetOverflow("data region"))?;
        for pending in &mut self.channels {
            pending.meta.data_ptr = pending
                .meta
                .data_ptr
                .checked_add(CHANNEL_META_SIZE)
                .ok_or(LdError::OffsetOverflow("data region"))?;
        }

        // Re-link in case an earlier write terminated the chain.
        self.header.meta_ptr = CHANNEL_META_PTR;
        if let Some(prev) = self.channels.last_mut() {
            prev.meta.next_meta_ptr = prev.meta.meta_ptr + CHANNEL_META_SIZE;
        }

        let (meta_ptr, prev_meta_ptr, data_ptr) = match self.channels.last() {
            Some(prev) => (
                prev.meta.next_meta_ptr,
                prev.meta.meta_ptr,
                prev.meta
                    .data_ptr
                    .checked_add(prev.meta.data_len() as u32)
                    .ok_or(LdError::OffsetOverflow("data region"))?,
            ),
            None => (CHANNEL_META_PTR, 0, self.header.data_ptr),
        };
        data_ptr
            .checked_add(data_len)
            .ok_or(LdError::OffsetOverflow("data region"))?;

        let meta = ChannelMeta {
            meta_ptr,
            prev_meta_ptr,
            next_meta_ptr: meta_ptr + CHANNEL_META_SIZE,
            data_ptr,
            sample_count,
            dtype: DataType::Float32,
            freq: channel.avg_frequency() as u16,
            shift: 0,
            mul: 1,
            scale: 1,
            dec: 0,
            name: channel.name.clone(),
            short_name: String::new(),
            unit: channel.units.clone(),
        };
        debug!(
            "layout '{}': meta {:#x}, data {:#x}, {} samples",
            meta.name, meta.meta_ptr, meta.data_ptr, meta.sample_count
        );

        self.channels.push(PendingChannel {
            meta,
            source: channel,
        });
        Ok(())
    }

    pub fn add_all_channels(&mut self, log: &'a DataLog) -> Result<()> {
        for channel in log.channels() {
            self.add_channel(channel)?;
        }
        Ok(())
    }

    // Terminate the chain and record the final channel count.
    fn finalize(&mut self) {
        self.header.channel_count = self.channels.len() as u32;
        match self.channels.last_mut() {
            Some(last) => last.meta.next_meta_ptr = 0,
            None => self.header.meta_ptr = 0,
        }
    }

    pub fn write_to<W: Write + Seek>(&mut self, w: &mut W) -> Result<()> {
        self.finalize();

        write_header(w, &self.header)?;
        if let Some(event) = &self.header.event {
            w.seek(SeekFrom::Start(self.header.event_ptr as u64))?;
            write_event(w, event)?;
        }

        for (index, pending) in self.channels.iter().enumerate() {
            let counter = CHANNEL_COUNTER_BASE.wrapping_add(index as u16);
            w.seek(SeekFrom::Start(pending.meta.meta_ptr as u64))?;
            write_channel_meta(w, &pending.meta, counter)?;

            w.seek(SeekFrom::Start(pending.meta.data_ptr as u64))?;
            let mut buf = Vec::with_capacity(pending.meta.data_len());
            for sample in pending.source.samples() {
                write_f32(&mut buf, sample.value as f32)?;
            }
            w.write_all(&buf)?;
        }

        w.flush()?;
        Ok(())
    }

    /// Write the file to `path` through a temporary file in the same
    /// directory, renamed into place once complete.
    pub fn write_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut w)?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))?;
        }
        tmp.persist(path).map_err(|e| LdError::Io(e.error))?;
        Ok(())
    }
}

fn write_header<W: Write + Seek>(w: &mut W, header: &LdHeader) -> Result<()> {
    let (date, time) = match header.datetime {
        Some(dt) => (
            dt.format(DATE_FORMAT).to_string(),
            dt.format(TIME_FORMAT).to_string(),
        ),
        None => (String::new(), String::new()),
    };

    w.seek(SeekFrom::Start(0))?;
    write_u32(w, HEADER_MARKER)?;
    write_zeros(w, 4)?;
    write_u32(w, header.meta_ptr)?;
    write_u32(w, header.data_ptr)?;
    write_zeros(w, 20)?;
    write_u32(w, header.event_ptr)?;
    write_zeros(w, 24)?;
    for v in HEADER_STATIC {
        write_u16(w, v)?;
    }
    write_u32(w, header.device_serial)?;
    write_string(w, &header.device_type, DEVICE_TYPE_LEN)?;
    write_u16(w, header.device_version)?;
    write_u16(w, HEADER_STATIC_TAIL)?;
    write_u32(w, header.channel_count)?;
    write_zeros(w, 4)?;
    write_string(w, &date, DATE_LEN)?;
    write_zeros(w, 16)?;
    write_string(w, &time, DATE_LEN)?;
    write_zeros(w, 16)?;
    write_string(w, &header.driver, NAME_LEN)?;
    write_string(w, &header.vehicle_id, NAME_LEN)?;
    write_zeros(w, 64)?;
    write_string(w, &header.venue, NAME_LEN)?;
    write_zeros(w, 64 + 1024)?;
    write_u32(w, PRO_LOGGING_MAGIC)?;
    write_zeros(w, 66)?;
    write_string(w, &header.short_comment, NAME_LEN)?;
    write_zeros(w, 126)?;
    Ok(())
}

fn write_event<W: Write + Seek>(w: &mut W, event: &LdEvent) -> Result<()> {
    write_string(w, &event.name, NAME_LEN)?;
    write_string(w, &event.session, NAME_LEN)?;
    write_string(w, &event.comment, LONG_COMMENT_LEN)?;
    write_u16(w, event.venue_ptr)?;

    if let Some(venue) = &event.venue {
        w.seek(SeekFrom::Start(event.venue_ptr as u64))?;
        write_string(w, &venue.name, NAME_LEN)?;
        write_zeros(w, 1034)?;
        write_u16(w, venue.vehicle_ptr)?;

        if let Some(vehicle) = &venue.vehicle {
            w.seek(SeekFrom::Start(venue.vehicle_ptr as u64))?;
            write_string(w, &vehicle.id, NAME_LEN)?;
            write_zeros(w, 128)?;
            write_u32(w, vehicle.weight)?;
            write_string(w, &vehicle.vehicle_type, VEHICLE_TYPE_LEN)?;
            write_string(w, &vehicle.comment, VEHICLE_COMMENT_LEN)?;
        }
    }
    Ok(())
}

fn write_channel_meta<W: Write>(w: &mut W, meta: &ChannelMeta, counter: u16) -> Result<()> {
    let (dtype_a, dtype) = meta.dtype.discriminator();

    write_u32(w, meta.prev_meta_ptr)?;
    write_u32(w, meta.next_meta_ptr)?;
    write_u32(w, meta.data_ptr)?;
    write_u32(w, meta.sample_count)?;
    write_u16(w, counter)?;
    write_u16(w, dtype_a)?;
    write_u16(w, dtype)?;
    write_u16(w, meta.freq)?;
    write_i16(w, meta.shift)?;
    write_i16(w, meta.mul)?;
    write_i16(w, meta.scale)?;
    write_i16(w, meta.dec)?;
    write_string(w, &meta.name, CHANNEL_NAME_LEN)?;
    write_string(w, &meta.short_name, CHANNEL_SHORT_NAME_LEN)?;
    write_string(w, &meta.unit, CHANNEL_UNIT_LEN)?;
    write_zeros(w, 40)?;
    Ok(())
}
