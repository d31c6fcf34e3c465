//! Big-endian primitive codecs used by every box variant.
//!
//! [`ReadIsoExt`] and [`WriteIsoExt`] extend any `Read`/`Write` (a file, a
//! `std::io::Cursor` over a payload buffer, a counting sink) with the
//! integer, fixed-point, string and packed-language encodings of
//! ISO/IEC 14496-12. A read that runs past the end of the source fails with
//! [`Error::Truncated`]; no partial value is ever returned.

use crate::boxes::FourCC;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

fn short(needed: u64) -> impl Fn(io::Error) -> Error {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated { needed }
        } else {
            Error::Io(e)
        }
    }
}

pub trait ReadIsoExt: Read {
    fn read_uint8(&mut self) -> Result<u8> {
        ReadBytesExt::read_u8(self).map_err(short(1))
    }

    fn read_uint16(&mut self) -> Result<u16> {
        ReadBytesExt::read_u16::<BigEndian>(self).map_err(short(2))
    }

    fn read_uint24(&mut self) -> Result<u32> {
        ReadBytesExt::read_u24::<BigEndian>(self).map_err(short(3))
    }

    fn read_uint32(&mut self) -> Result<u32> {
        ReadBytesExt::read_u32::<BigEndian>(self).map_err(short(4))
    }

    fn read_uint64(&mut self) -> Result<u64> {
        ReadBytesExt::read_u64::<BigEndian>(self).map_err(short(8))
    }

    fn read_int16(&mut self) -> Result<i16> {
        ReadBytesExt::read_i16::<BigEndian>(self).map_err(short(2))
    }

    fn read_int32(&mut self) -> Result<i32> {
        ReadBytesExt::read_i32::<BigEndian>(self).map_err(short(4))
    }

    fn read_int64(&mut self) -> Result<i64> {
        ReadBytesExt::read_i64::<BigEndian>(self).map_err(short(8))
    }

    /// Signed 16.16 fixed point.
    fn read_fixed_16_16(&mut self) -> Result<f64> {
        Ok(self.read_int32()? as f64 / 65536.0)
    }

    /// Signed 8.8 fixed point.
    fn read_fixed_8_8(&mut self) -> Result<f32> {
        Ok(self.read_int16()? as f32 / 256.0)
    }

    /// Version byte and 24-bit flags of a full box.
    fn read_full_header(&mut self) -> Result<(u8, u32)> {
        let version = self.read_uint8()?;
        let flags = self.read_uint24()?;
        Ok((version, flags))
    }

    fn read_fourcc(&mut self) -> Result<FourCC> {
        Ok(FourCC(self.read_array::<4>()?))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf).map_err(short(N as u64))?;
        Ok(buf)
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf).map_err(short(len as u64))?;
        Ok(buf)
    }

    /// Fixed-length UTF-8 string.
    fn read_utf8(&mut self, len: usize) -> Result<String> {
        String::from_utf8(self.read_vec(len)?).map_err(|_| Error::InvalidUtf8)
    }

    /// Zero-terminated UTF-8 string; the terminator is consumed.
    fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_uint8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// ISO 639-2/T code packed as three 5-bit characters biased by 0x60.
    fn read_language(&mut self) -> Result<String> {
        Ok(language_from_u16(self.read_uint16()?))
    }
}

impl<R: Read + ?Sized> ReadIsoExt for R {}

pub trait WriteIsoExt: Write {
    fn write_uint8(&mut self, v: u8) -> Result<()> {
        Ok(WriteBytesExt::write_u8(self, v)?)
    }

    fn write_uint16(&mut self, v: u16) -> Result<()> {
        Ok(WriteBytesExt::write_u16::<BigEndian>(self, v)?)
    }

    fn write_uint24(&mut self, v: u32) -> Result<()> {
        Ok(WriteBytesExt::write_u24::<BigEndian>(self, v & 0x00ff_ffff)?)
    }

    fn write_uint32(&mut self, v: u32) -> Result<()> {
        Ok(WriteBytesExt::write_u32::<BigEndian>(self, v)?)
    }

    fn write_uint64(&mut self, v: u64) -> Result<()> {
        Ok(WriteBytesExt::write_u64::<BigEndian>(self, v)?)
    }

    fn write_int16(&mut self, v: i16) -> Result<()> {
        Ok(WriteBytesExt::write_i16::<BigEndian>(self, v)?)
    }

    fn write_int32(&mut self, v: i32) -> Result<()> {
        Ok(WriteBytesExt::write_i32::<BigEndian>(self, v)?)
    }

    fn write_int64(&mut self, v: i64) -> Result<()> {
        Ok(WriteBytesExt::write_i64::<BigEndian>(self, v)?)
    }

    fn write_fixed_16_16(&mut self, v: f64) -> Result<()> {
        self.write_int32((v * 65536.0).round() as i32)
    }

    fn write_fixed_8_8(&mut self, v: f32) -> Result<()> {
        self.write_int16((v * 256.0).round() as i16)
    }

    fn write_full_header(&mut self, version: u8, flags: u32) -> Result<()> {
        self.write_uint8(version)?;
        self.write_uint24(flags)
    }

    fn write_fourcc(&mut self, cc: FourCC) -> Result<()> {
        self.write_bytes(&cc.0)
    }

    fn write_bytes(&mut self, b: &[u8]) -> Result<()> {
        Ok(self.write_all(b)?)
    }

    /// UTF-8 bytes followed by a zero terminator.
    fn write_cstring(&mut self, s: &str) -> Result<()> {
        self.write_bytes(s.as_bytes())?;
        self.write_uint8(0)
    }

    fn write_language(&mut self, lang: &str) -> Result<()> {
        self.write_uint16(language_to_u16(lang))
    }
}

impl<W: Write + ?Sized> WriteIsoExt for W {}

/// Bytes left between the cursor position and the end of its buffer.
pub fn remaining(c: &Cursor<&[u8]>) -> u64 {
    (c.get_ref().len() as u64).saturating_sub(c.position())
}

pub fn language_from_u16(code: u16) -> String {
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    [c1 as char, c2 as char, c3 as char].iter().collect()
}

/// Anything that is not three characters becomes `und`.
pub fn language_to_u16(lang: &str) -> u16 {
    let b = lang.as_bytes();
    let b = if b.len() == 3 { b } else { b"und" };
    b.iter()
        .fold(0u16, |acc, &c| (acc << 5) | (c.wrapping_sub(0x60) & 0x1F) as u16)
}

/// Reads bit fields of up to 31 bits, most significant bit first.
///
/// Bytes are pulled from the inner reader whole: a 3-bit read consumes a
/// full byte, and the unread 5 bits stay buffered here. Use
/// [`BitReader::bit_offset`] to see how far into the current byte the
/// reader is; dropping the reader discards the buffered remainder.
pub struct BitReader<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    current: u8,
    bits_left: u32,
}

impl<'a, R: Read + ?Sized> BitReader<'a, R> {
    pub fn new(inner: &'a mut R) -> Self {
        Self { inner, current: 0, bits_left: 0 }
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        if count > 31 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot read {count} bits at once"),
            )));
        }
        let mut value = 0u32;
        let mut remaining = count;
        while remaining > 0 {
            if self.bits_left == 0 {
                self.current = self.inner.read_uint8()?;
                self.bits_left = 8;
            }
            let take = remaining.min(self.bits_left);
            let shift = self.bits_left - take;
            let bits = (self.current as u32 >> shift) & ((1 << take) - 1);
            value = (value << take) | bits;
            self.bits_left -= take;
            remaining -= take;
        }
        Ok(value)
    }

    /// Bits already consumed from the current byte (0 when byte aligned).
    pub fn bit_offset(&self) -> u32 {
        (8 - self.bits_left) % 8
    }
}

/// Packs bit fields MSB first; [`BitWriter::finish`] zero-pads the last byte.
pub struct BitWriter<'a, W: Write + ?Sized> {
    inner: &'a mut W,
    current: u8,
    filled: u32,
}

impl<'a, W: Write + ?Sized> BitWriter<'a, W> {
    pub fn new(inner: &'a mut W) -> Self {
        Self { inner, current: 0, filled: 0 }
    }

    pub fn write_bits(&mut self, value: u32, count: u32) -> Result<()> {
        for i in (0..count).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.current = (self.current << 1) | bit;
            self.filled += 1;
            if self.filled == 8 {
                self.inner.write_uint8(self.current)?;
                self.current = 0;
                self.filled = 0;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        if self.filled > 0 {
            let pad = 8 - self.filled;
            self.write_bits(0, pad)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_and_fixed_point() {
        let data = [0x00, 0x01, 0x80, 0x00, 0x01, 0x00, 0xff, 0xff, 0xff, 0xfe];
        let mut c = Cursor::new(&data[..]);
        assert_eq!(c.read_fixed_16_16().unwrap(), 1.5);
        assert_eq!(c.read_fixed_8_8().unwrap(), 1.0);
        assert_eq!(c.read_int32().unwrap(), -2);
        assert_eq!(remaining(&c), 0);
    }

    #[test]
    fn short_reads_are_truncated() {
        let data = [0u8; 3];
        let mut c = Cursor::new(&data[..]);
        assert!(matches!(c.read_uint32(), Err(Error::Truncated { needed: 4 })));
    }

    #[test]
    fn language_packs_five_bits_per_char() {
        assert_eq!(language_to_u16("und"), 0x55c4);
        assert_eq!(language_from_u16(0x55c4), "und");
        assert_eq!(language_to_u16("toolong"), 0x55c4);
    }

    #[test]
    fn cstring_consumes_terminator() {
        let data = b"abc\0d";
        let mut c = Cursor::new(&data[..]);
        assert_eq!(c.read_cstring().unwrap(), "abc");
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn bit_fields_span_bytes() {
        let data = [0b1011_0011, 0b1100_0000];
        let mut c = Cursor::new(&data[..]);
        let mut bits = BitReader::new(&mut c);
        assert_eq!(bits.read_bits(3).unwrap(), 0b101);
        assert_eq!(bits.bit_offset(), 3);
        assert_eq!(bits.read_bits(7).unwrap(), 0b10011_11);
        assert_eq!(bits.bit_offset(), 2);
        assert!(bits.read_bits(32).is_err());

        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        w.write_bits(0b101, 3).unwrap();
        w.write_bits(0b1001111, 7).unwrap();
        w.finish().unwrap();
        assert_eq!(out, data);
    }
}
