// Fixed-width little-endian field readers and writers

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::core::error::{LdError, Result};

pub fn read_u16<R: Read>(r: &mut R, field: &'static str) -> Result<u16> {
    r.read_u16::<LittleEndian>()
        .map_err(|e| LdError::from_read(e, field))
}

pub fn read_i16<R: Read>(r: &mut R, field: &'static str) -> Result<i16> {
    r.read_i16::<LittleEndian>()
        .map_err(|e| LdError::from_read(e, field))
}

pub fn read_u32<R: Read>(r: &mut R, field: &'static str) -> Result<u32> {
    r.read_u32::<LittleEndian>()
        .map_err(|e| LdError::from_read(e, field))
}

pub fn read_i32<R: Read>(r: &mut R, field: &'static str) -> Result<i32> {
    r.read_i32::<LittleEndian>()
        .map_err(|e| LdError::from_read(e, field))
}

pub fn read_f32<R: Read>(r: &mut R, field: &'static str) -> Result<f32> {
    r.read_f32::<LittleEndian>()
        .map_err(|e| LdError::from_read(e, field))
}

pub fn read_f16<R: Read>(r: &mut R, field: &'static str) -> Result<f16> {
    read_u16(r, field).map(f16::from_bits)
}

/// Read a fixed-width text field and strip its padding.
pub fn read_string<R: Read>(r: &mut R, len: usize, field: &'static str) -> Result<String> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|e| LdError::from_read(e, field))?;
    Ok(decode_string(&buf))
}

/// Skip a reserved byte range.
pub fn skip<R: Seek>(r: &mut R, len: usize) -> Result<()> {
    r.seek(SeekFrom::Current(len as i64))?;
    Ok(())
}

/// Decode a NUL/space padded field: the trailing padding run is removed,
/// anything before it is kept as-is.
pub fn decode_string(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Copy `s` into a zero-filled field of `width` bytes. Longer strings are
/// cut at the field width.
pub fn encode_string(s: &str, width: usize) -> Vec<u8> {
    let mut buf = vec![0u8; width];
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

pub fn write_u16<W: Write>(w: &mut W, v: u16) -> Result<()> {
    w.write_u16::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_i16<W: Write>(w: &mut W, v: i16) -> Result<()> {
    w.write_i16::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_u32::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<()> {
    w.write_i32::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_f32<W: Write>(w: &mut W, v: f32) -> Result<()> {
    w.write_f32::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_string<W: Write>(w: &mut W, s: &str, width: usize) -> Result<()> {
    w.write_all(&encode_string(s, width))?;
    Ok(())
}

/// Write `len` zero bytes for a reserved range.
pub fn write_zeros<W: Write>(w: &mut W, len: usize) -> Result<()> {
    w.write_all(&vec![0u8; len])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_string_nul_padded() {
        assert_eq!(decode_string(b"ab\0\0\0\0\0\0"), "ab");
    }

    #[test]
    fn test_decode_string_space_padded() {
        assert_eq!(decode_string(b"        "), "");
        assert_eq!(decode_string(b"rpm \0 \0\0"), "rpm");
    }

    #[test]
    fn test_decode_string_keeps_embedded_bytes() {
        assert_eq!(decode_string(b"a\0b\0\0"), "a\0b");
        assert_eq!(decode_string(b" lead"), " lead");
    }

    #[test]
    fn test_encode_string_pads_and_truncates() {
        assert_eq!(encode_string("ab", 4), b"ab\0\0");
        assert_eq!(encode_string("abcdef", 4), b"abcd");
        assert_eq!(encode_string("", 2), b"\0\0");
    }

    #[test]
    fn test_little_endian_fields() {
        let mut buf = Cursor::new(Vec::new());
        write_u16(&mut buf, 0x1234).unwrap();
        write_i16(&mut buf, -2).unwrap();
        write_u32(&mut buf, 0xdeadbeef).unwrap();
        write_i32(&mut buf, -70_000).unwrap();
        write_f32(&mut buf, 1.5).unwrap();

        let bytes = buf.into_inner();
        assert_eq!(&bytes[0..2], &[0x34, 0x12]);
        assert_eq!(&bytes[4..8], &[0xef, 0xbe, 0xad, 0xde]);

        let mut r = Cursor::new(bytes);
        assert_eq!(read_u16(&mut r, "a").unwrap(), 0x1234);
        assert_eq!(read_i16(&mut r, "b").unwrap(), -2);
        assert_eq!(read_u32(&mut r, "c").unwrap(), 0xdeadbeef);
        assert_eq!(read_i32(&mut r, "d").unwrap(), -70_000);
        assert_eq!(read_f32(&mut r, "e").unwrap(), 1.5);
    }

    #[test]
    fn test_read_f16() {
        let mut r = Cursor::new(f16::from_f32(0.25).to_bits().to_le_bytes().to_vec());
        assert_eq!(read_f16(&mut r, "sample").unwrap().to_f32(), 0.25);
    }

    #[test]
    fn test_short_read_is_truncated() {
        let mut r = Cursor::new(vec![0x01, 0x02, 0x03]);
        assert!(matches!(
            read_u32(&mut r, "data_ptr"),
            Err(LdError::TruncatedInput { field: "data_ptr" })
        ));

        let mut r = Cursor::new(vec![b'a'; 10]);
        assert!(matches!(
            read_string(&mut r, 64, "driver"),
            Err(LdError::TruncatedInput { field: "driver" })
        ));
    }

    #[test]
    fn test_skip_then_read() {
        let mut r = Cursor::new(vec![0xff, 0xff, 0xff, 0x07, 0x00]);
        skip(&mut r, 3).unwrap();
        assert_eq!(read_u16(&mut r, "dtype_a").unwrap(), 7);
    }
}
