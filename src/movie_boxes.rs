//! Movie, track and media level metadata boxes.

use crate::boxes::{BoxContent, FourCC};
use crate::cursor::{ReadIsoExt, WriteIsoExt, language_from_u16, language_to_u16, remaining};
use crate::error::Result;
use serde::Serialize;
use std::io::{Cursor, Write};

pub const TRACK_ENABLED: u32 = 0x1;
pub const TRACK_IN_MOVIE: u32 = 0x2;
pub const TRACK_IN_PREVIEW: u32 = 0x4;
pub const TRACK_IN_POSTER: u32 = 0x8;

/// Identity transform in 16.16 / 2.30 fixed point.
pub const UNITY_MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

fn fits_u32(values: &[u64]) -> bool {
    values.iter().all(|&v| v <= u32::MAX as u64)
}

fn read_matrix(r: &mut Cursor<&[u8]>) -> Result<[i32; 9]> {
    let mut m = [0i32; 9];
    for v in m.iter_mut() {
        *v = r.read_int32()?;
    }
    Ok(m)
}

fn write_matrix(w: &mut dyn Write, m: &[i32; 9]) -> Result<()> {
    for &v in m {
        w.write_int32(v)?;
    }
    Ok(())
}

/// Time and duration fields that are 32-bit in version 0 and 64-bit in 1.
fn read_versioned(r: &mut Cursor<&[u8]>, version: u8) -> Result<u64> {
    if version == 1 {
        r.read_uint64()
    } else {
        Ok(r.read_uint32()? as u64)
    }
}

fn write_versioned(w: &mut dyn Write, version: u8, v: u64) -> Result<()> {
    if version == 1 {
        w.write_uint64(v)
    } else {
        w.write_uint32(v as u32)
    }
}

/// `ftyp`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTypeBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl FileTypeBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let major_brand = r.read_fourcc()?;
        let minor_version = r.read_uint32()?;
        let mut compatible_brands = Vec::new();
        while remaining(r) >= 4 {
            compatible_brands.push(r.read_fourcc()?);
        }
        Ok(Self { major_brand, minor_version, compatible_brands })
    }
}

impl BoxContent for FileTypeBox {
    fn content_size(&self) -> u64 {
        8 + 4 * self.compatible_brands.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_fourcc(self.major_brand)?;
        w.write_uint32(self.minor_version)?;
        for &b in &self.compatible_brands {
            w.write_fourcc(b)?;
        }
        Ok(())
    }
}

/// `mvhd`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: f64,
    pub volume: f32,
    #[serde(skip)]
    pub reserved: [u8; 10],
    pub matrix: [i32; 9],
    /// QuickTime preview, poster, selection and current times.
    #[serde(skip)]
    pub pre_defined: [u8; 24],
    pub next_track_id: u32,
}

impl MovieHeaderBox {
    /// Version 1 is chosen when a time or the duration needs 64 bits.
    pub fn new(creation_time: u64, timescale: u32, duration: u64, next_track_id: u32) -> Self {
        let version = if fits_u32(&[creation_time, duration]) { 0 } else { 1 };
        Self {
            version,
            flags: 0,
            creation_time,
            modification_time: creation_time,
            timescale,
            duration,
            rate: 1.0,
            volume: 1.0,
            reserved: [0; 10],
            matrix: UNITY_MATRIX,
            pre_defined: [0; 24],
            next_track_id,
        }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let creation_time = read_versioned(r, version)?;
        let modification_time = read_versioned(r, version)?;
        let timescale = r.read_uint32()?;
        let duration = read_versioned(r, version)?;
        let rate = r.read_fixed_16_16()?;
        let volume = r.read_fixed_8_8()?;
        let reserved = r.read_array::<10>()?;
        let matrix = read_matrix(r)?;
        let pre_defined = r.read_array::<24>()?;
        let next_track_id = r.read_uint32()?;
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            reserved,
            matrix,
            pre_defined,
            next_track_id,
        })
    }
}

impl BoxContent for MovieHeaderBox {
    fn content_size(&self) -> u64 {
        if self.version == 1 { 112 } else { 100 }
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        write_versioned(w, self.version, self.creation_time)?;
        write_versioned(w, self.version, self.modification_time)?;
        w.write_uint32(self.timescale)?;
        write_versioned(w, self.version, self.duration)?;
        w.write_fixed_16_16(self.rate)?;
        w.write_fixed_8_8(self.volume)?;
        w.write_bytes(&self.reserved)?;
        write_matrix(w, &self.matrix)?;
        w.write_bytes(&self.pre_defined)?;
        w.write_uint32(self.next_track_id)
    }
}

/// `tkhd`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    /// Reserved words written back as read: the one after `track_id`, the
    /// eight bytes after `duration` and the one after `volume`.
    #[serde(skip)]
    pub reserved: (u32, [u8; 8], u16),
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: f32,
    pub matrix: [i32; 9],
    pub width: f64,
    pub height: f64,
}

impl TrackHeaderBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let creation_time = read_versioned(r, version)?;
        let modification_time = read_versioned(r, version)?;
        let track_id = r.read_uint32()?;
        let reserved_a = r.read_uint32()?;
        let duration = read_versioned(r, version)?;
        let reserved_b = r.read_array::<8>()?;
        let layer = r.read_int16()?;
        let alternate_group = r.read_int16()?;
        let volume = r.read_fixed_8_8()?;
        let reserved_c = r.read_uint16()?;
        let matrix = read_matrix(r)?;
        let width = r.read_fixed_16_16()?;
        let height = r.read_fixed_16_16()?;
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            reserved: (reserved_a, reserved_b, reserved_c),
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & TRACK_ENABLED != 0
    }

    pub fn is_in_movie(&self) -> bool {
        self.flags & TRACK_IN_MOVIE != 0
    }

    pub fn is_in_preview(&self) -> bool {
        self.flags & TRACK_IN_PREVIEW != 0
    }

    pub fn is_in_poster(&self) -> bool {
        self.flags & TRACK_IN_POSTER != 0
    }

    pub(crate) fn pick_version(&mut self) {
        self.version = if fits_u32(&[self.creation_time, self.modification_time, self.duration]) {
            0
        } else {
            1
        };
    }
}

impl BoxContent for TrackHeaderBox {
    fn content_size(&self) -> u64 {
        if self.version == 1 { 96 } else { 84 }
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        write_versioned(w, self.version, self.creation_time)?;
        write_versioned(w, self.version, self.modification_time)?;
        w.write_uint32(self.track_id)?;
        w.write_uint32(self.reserved.0)?;
        write_versioned(w, self.version, self.duration)?;
        w.write_bytes(&self.reserved.1)?;
        w.write_int16(self.layer)?;
        w.write_int16(self.alternate_group)?;
        w.write_fixed_8_8(self.volume)?;
        w.write_uint16(self.reserved.2)?;
        write_matrix(w, &self.matrix)?;
        w.write_fixed_16_16(self.width)?;
        w.write_fixed_16_16(self.height)
    }
}

/// `mdhd`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
    /// Top bit of the packed language word.
    #[serde(skip)]
    pub language_pad: bool,
    pub quality: u16,
}

impl MediaHeaderBox {
    pub fn new(creation_time: u64, timescale: u32, duration: u64, language: &str) -> Self {
        let version = if fits_u32(&[creation_time, duration]) { 0 } else { 1 };
        Self {
            version,
            flags: 0,
            creation_time,
            modification_time: creation_time,
            timescale,
            duration,
            language: language.to_string(),
            language_pad: false,
            quality: 0,
        }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let creation_time = read_versioned(r, version)?;
        let modification_time = read_versioned(r, version)?;
        let timescale = r.read_uint32()?;
        let duration = read_versioned(r, version)?;
        let code = r.read_uint16()?;
        let quality = r.read_uint16()?;
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            language: language_from_u16(code),
            language_pad: code & 0x8000 != 0,
            quality,
        })
    }
}

impl BoxContent for MediaHeaderBox {
    fn content_size(&self) -> u64 {
        if self.version == 1 { 36 } else { 24 }
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        write_versioned(w, self.version, self.creation_time)?;
        write_versioned(w, self.version, self.modification_time)?;
        w.write_uint32(self.timescale)?;
        write_versioned(w, self.version, self.duration)?;
        let pad = if self.language_pad { 0x8000 } else { 0 };
        w.write_uint16(language_to_u16(&self.language) | pad)?;
        w.write_uint16(self.quality)
    }
}

/// `hdlr`
///
/// QuickTime writers fill the pre-defined and reserved words with component
/// codes, so they are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerBox {
    pub version: u8,
    pub flags: u32,
    pub pre_defined: u32,
    pub handler_type: FourCC,
    pub reserved: [u32; 3],
    pub name: String,
    /// Whether `name` was followed by a NUL in the source.
    pub zero_terminated: bool,
}

impl HandlerBox {
    pub fn new(handler_type: FourCC, name: &str) -> Self {
        Self {
            version: 0,
            flags: 0,
            pre_defined: 0,
            handler_type,
            reserved: [0; 3],
            name: name.to_string(),
            zero_terminated: true,
        }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let pre_defined = r.read_uint32()?;
        let handler_type = r.read_fourcc()?;
        let reserved = [r.read_uint32()?, r.read_uint32()?, r.read_uint32()?];
        let rest = r.read_vec(remaining(r) as usize)?;
        let (name, zero_terminated) = match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                // Anything after the terminator is left for the caller.
                r.set_position(r.position() - (rest.len() - end - 1) as u64);
                (&rest[..end], true)
            }
            None => (&rest[..], false),
        };
        let name = std::str::from_utf8(name)
            .map_err(|_| crate::error::Error::InvalidUtf8)?
            .to_string();
        Ok(Self {
            version,
            flags,
            pre_defined,
            handler_type,
            reserved,
            name,
            zero_terminated,
        })
    }
}

impl BoxContent for HandlerBox {
    fn content_size(&self) -> u64 {
        24 + self.name.len() as u64 + self.zero_terminated as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.pre_defined)?;
        w.write_fourcc(self.handler_type)?;
        for &v in &self.reserved {
            w.write_uint32(v)?;
        }
        w.write_bytes(self.name.as_bytes())?;
        if self.zero_terminated {
            w.write_uint8(0)?;
        }
        Ok(())
    }
}

/// `vmhd`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMediaHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl Default for VideoMediaHeaderBox {
    fn default() -> Self {
        Self { version: 0, flags: 1, graphics_mode: 0, opcolor: [0; 3] }
    }
}

impl VideoMediaHeaderBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let graphics_mode = r.read_uint16()?;
        let opcolor = [r.read_uint16()?, r.read_uint16()?, r.read_uint16()?];
        Ok(Self { version, flags, graphics_mode, opcolor })
    }
}

impl BoxContent for VideoMediaHeaderBox {
    fn content_size(&self) -> u64 {
        12
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint16(self.graphics_mode)?;
        for &c in &self.opcolor {
            w.write_uint16(c)?;
        }
        Ok(())
    }
}

/// `smhd`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SoundMediaHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub balance: f32,
    #[serde(skip)]
    pub reserved: u16,
}

impl SoundMediaHeaderBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let balance = r.read_fixed_8_8()?;
        let reserved = r.read_uint16()?;
        Ok(Self { version, flags, balance, reserved })
    }
}

impl BoxContent for SoundMediaHeaderBox {
    fn content_size(&self) -> u64 {
        8
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_fixed_8_8(self.balance)?;
        w.write_uint16(self.reserved)
    }
}

/// `hmhd`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HintMediaHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub max_pdu_size: u16,
    pub avg_pdu_size: u16,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    #[serde(skip)]
    pub reserved: u32,
}

impl HintMediaHeaderBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let max_pdu_size = r.read_uint16()?;
        let avg_pdu_size = r.read_uint16()?;
        let max_bitrate = r.read_uint32()?;
        let avg_bitrate = r.read_uint32()?;
        let reserved = r.read_uint32()?;
        Ok(Self {
            version,
            flags,
            max_pdu_size,
            avg_pdu_size,
            max_bitrate,
            avg_bitrate,
            reserved,
        })
    }
}

impl BoxContent for HintMediaHeaderBox {
    fn content_size(&self) -> u64 {
        20
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint16(self.max_pdu_size)?;
        w.write_uint16(self.avg_pdu_size)?;
        w.write_uint32(self.max_bitrate)?;
        w.write_uint32(self.avg_bitrate)?;
        w.write_uint32(self.reserved)
    }
}

/// `nmhd`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NullMediaHeaderBox {
    pub version: u8,
    pub flags: u32,
}

impl NullMediaHeaderBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        Ok(Self { version, flags })
    }
}

impl BoxContent for NullMediaHeaderBox {
    fn content_size(&self) -> u64 {
        4
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)
    }
}

/// `url ` data reference. Flag 1 means the media is in this file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataEntryUrlBox {
    pub version: u8,
    pub flags: u32,
    pub location: Option<String>,
}

impl DataEntryUrlBox {
    pub fn self_contained() -> Self {
        Self { version: 0, flags: 1, location: None }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let location = if remaining(r) > 0 { Some(r.read_cstring()?) } else { None };
        Ok(Self { version, flags, location })
    }
}

impl BoxContent for DataEntryUrlBox {
    fn content_size(&self) -> u64 {
        4 + self.location.as_ref().map_or(0, |l| l.len() as u64 + 1)
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        if let Some(l) = &self.location {
            w.write_cstring(l)?;
        }
        Ok(())
    }
}

/// `urn ` data reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataEntryUrnBox {
    pub version: u8,
    pub flags: u32,
    pub name: String,
    pub location: Option<String>,
}

impl DataEntryUrnBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let name = r.read_cstring()?;
        let location = if remaining(r) > 0 { Some(r.read_cstring()?) } else { None };
        Ok(Self { version, flags, name, location })
    }
}

impl BoxContent for DataEntryUrnBox {
    fn content_size(&self) -> u64 {
        4 + self.name.len() as u64 + 1 + self.location.as_ref().map_or(0, |l| l.len() as u64 + 1)
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_cstring(&self.name)?;
        if let Some(l) = &self.location {
            w.write_cstring(l)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditListEntry {
    pub segment_duration: u64,
    /// `-1` marks an empty edit.
    pub media_time: i64,
    pub media_rate_integer: i16,
    pub media_rate_fraction: i16,
}

impl EditListEntry {
    pub fn empty(segment_duration: u64) -> Self {
        Self { segment_duration, media_time: -1, media_rate_integer: 1, media_rate_fraction: 0 }
    }

    pub fn media(segment_duration: u64, media_time: i64) -> Self {
        Self { segment_duration, media_time, media_rate_integer: 1, media_rate_fraction: 0 }
    }
}

/// `elst`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditListBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<EditListEntry>,
}

impl EditListBox {
    pub fn new(entries: Vec<EditListEntry>) -> Self {
        let wide = entries.iter().any(|e| {
            e.segment_duration > u32::MAX as u64 || i32::try_from(e.media_time).is_err()
        });
        Self { version: wide as u8, flags: 0, entries }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = r.read_uint32()?;
        let mut entries = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            let (segment_duration, media_time) = if version == 1 {
                (r.read_uint64()?, r.read_int64()?)
            } else {
                (r.read_uint32()? as u64, r.read_int32()? as i64)
            };
            entries.push(EditListEntry {
                segment_duration,
                media_time,
                media_rate_integer: r.read_int16()?,
                media_rate_fraction: r.read_int16()?,
            });
        }
        Ok(Self { version, flags, entries })
    }
}

impl BoxContent for EditListBox {
    fn content_size(&self) -> u64 {
        let per_entry = if self.version == 1 { 20 } else { 12 };
        8 + per_entry * self.entries.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.entries.len() as u32)?;
        for e in &self.entries {
            if self.version == 1 {
                w.write_uint64(e.segment_duration)?;
                w.write_int64(e.media_time)?;
            } else {
                w.write_uint32(e.segment_duration as u32)?;
                w.write_int32(e.media_time as i32)?;
            }
            w.write_int16(e.media_rate_integer)?;
            w.write_int16(e.media_rate_fraction)?;
        }
        Ok(())
    }
}

/// `xml `: the document text, written back exactly as read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlBox {
    pub version: u8,
    pub flags: u32,
    pub xml: String,
}

impl XmlBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let xml = r.read_utf8(remaining(r) as usize)?;
        Ok(Self { version, flags, xml })
    }
}

impl BoxContent for XmlBox {
    fn content_size(&self) -> u64 {
        4 + self.xml.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_bytes(self.xml.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(b: &dyn BoxContent) -> Vec<u8> {
        let mut out = Vec::new();
        b.write_content(&mut out).unwrap();
        assert_eq!(out.len() as u64, b.content_size());
        out
    }

    #[test]
    fn mvhd_switches_to_version_1_for_wide_durations() {
        let narrow = MovieHeaderBox::new(0, 1000, 5000, 2);
        assert_eq!(narrow.version, 0);
        assert_eq!(encode(&narrow).len(), 100);

        let wide = MovieHeaderBox::new(0, 1000, u32::MAX as u64 + 1, 2);
        assert_eq!(wide.version, 1);
        let bytes = encode(&wide);
        let parsed = MovieHeaderBox::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(parsed, wide);
    }

    #[test]
    fn hdlr_keeps_unterminated_name() {
        let mut h = HandlerBox::new(FourCC(*b"vide"), "VideoHandler");
        h.zero_terminated = false;
        let bytes = encode(&h);
        assert_eq!(bytes.len(), 24 + 12);
        let parsed = HandlerBox::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert!(!parsed.zero_terminated);
        assert_eq!(parsed.name, "VideoHandler");
    }

    #[test]
    fn hdlr_leaves_bytes_after_terminator_unread() {
        let mut bytes = encode(&HandlerBox::new(FourCC(*b"soun"), "Sound"));
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let mut c = Cursor::new(&bytes[..]);
        let parsed = HandlerBox::parse(&mut c).unwrap();
        assert_eq!(parsed.name, "Sound");
        assert_eq!(remaining(&c), 2);
    }

    #[test]
    fn elst_empty_edit_then_media_edit() {
        let elst = EditListBox::new(vec![EditListEntry::empty(600), EditListEntry::media(3000, 0)]);
        assert_eq!(elst.version, 0);
        let bytes = encode(&elst);
        assert_eq!(bytes.len(), 8 + 2 * 12);
        let parsed = EditListBox::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(parsed.entries[0].media_time, -1);
        assert_eq!(parsed.entries[1].segment_duration, 3000);
    }

    #[test]
    fn tkhd_flag_helpers() {
        let bytes = {
            let mut v = vec![0u8, 0, 0, 0x03];
            v.extend_from_slice(&[0u8; 80]);
            v
        };
        let t = TrackHeaderBox::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert!(t.is_enabled());
        assert!(t.is_in_movie());
        assert!(!t.is_in_preview());
        assert!(!t.is_in_poster());
    }
}
