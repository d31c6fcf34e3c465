//! Sample table (`stbl`) boxes and the fixed prefixes of sample entries.

use crate::boxes::BoxContent;
use crate::cursor::{BitReader, BitWriter, ReadIsoExt, WriteIsoExt, remaining};
use crate::error::Result;
use serde::Serialize;
use std::io::{Cursor, Read, Write};

/// Fields of a `VisualSampleEntry` (`avc1`, `hvc1`, `mp4v`, ...) ahead of its
/// child boxes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualSampleEntry {
    #[serde(skip)]
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    #[serde(skip)]
    pub pre_defined: [u8; 16],
    pub width: u16,
    pub height: u16,
    pub horiz_resolution: u32,
    pub vert_resolution: u32,
    /// QuickTime data size, zero in ISO files.
    pub data_size: u32,
    pub frame_count: u16,
    #[serde(skip)]
    pub compressor_name: [u8; 32],
    pub depth: u16,
    pub color_table_id: i16,
}

impl VisualSampleEntry {
    pub const SIZE: u64 = 78;

    pub fn new(width: u16, height: u16) -> Self {
        Self {
            reserved: [0; 6],
            data_reference_index: 1,
            pre_defined: [0; 16],
            width,
            height,
            horiz_resolution: 0x0048_0000,
            vert_resolution: 0x0048_0000,
            data_size: 0,
            frame_count: 1,
            compressor_name: [0; 32],
            depth: 0x0018,
            color_table_id: -1,
        }
    }

    pub fn parse<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let reserved = r.read_array::<6>()?;
        let data_reference_index = r.read_uint16()?;
        let pre_defined = r.read_array::<16>()?;
        let width = r.read_uint16()?;
        let height = r.read_uint16()?;
        let horiz_resolution = r.read_uint32()?;
        let vert_resolution = r.read_uint32()?;
        let data_size = r.read_uint32()?;
        let frame_count = r.read_uint16()?;
        let compressor_name = r.read_array::<32>()?;
        let depth = r.read_uint16()?;
        let color_table_id = r.read_int16()?;
        Ok(Self {
            reserved,
            data_reference_index,
            pre_defined,
            width,
            height,
            horiz_resolution,
            vert_resolution,
            data_size,
            frame_count,
            compressor_name,
            depth,
            color_table_id,
        })
    }

    /// Pascal-string compressor name.
    pub fn compressor(&self) -> String {
        let len = (self.compressor_name[0] as usize).min(31);
        String::from_utf8_lossy(&self.compressor_name[1..1 + len]).into_owned()
    }
}

impl BoxContent for VisualSampleEntry {
    fn content_size(&self) -> u64 {
        Self::SIZE
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_bytes(&self.reserved)?;
        w.write_uint16(self.data_reference_index)?;
        w.write_bytes(&self.pre_defined)?;
        w.write_uint16(self.width)?;
        w.write_uint16(self.height)?;
        w.write_uint32(self.horiz_resolution)?;
        w.write_uint32(self.vert_resolution)?;
        w.write_uint32(self.data_size)?;
        w.write_uint16(self.frame_count)?;
        w.write_bytes(&self.compressor_name)?;
        w.write_uint16(self.depth)?;
        w.write_int16(self.color_table_id)
    }
}

/// Fields of an `AudioSampleEntry` ahead of its child boxes.
///
/// QuickTime sound descriptions add 16 (version 1) or 36 (version 2) bytes
/// after the common fields; they are kept raw in `qt_extension`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSampleEntry {
    #[serde(skip)]
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    pub sound_version: u16,
    pub revision: u16,
    pub vendor: u32,
    pub channel_count: u16,
    pub sample_size: u16,
    pub compression_id: i16,
    pub packet_size: u16,
    /// Unsigned 16.16.
    pub sample_rate: u32,
    #[serde(skip)]
    pub qt_extension: Vec<u8>,
}

impl AudioSampleEntry {
    pub fn new(channel_count: u16, sample_size: u16, sample_rate: u32) -> Self {
        Self {
            reserved: [0; 6],
            data_reference_index: 1,
            sound_version: 0,
            revision: 0,
            vendor: 0,
            channel_count,
            sample_size,
            compression_id: 0,
            packet_size: 0,
            sample_rate: sample_rate << 16,
            qt_extension: Vec::new(),
        }
    }

    pub fn parse<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let reserved = r.read_array::<6>()?;
        let data_reference_index = r.read_uint16()?;
        let sound_version = r.read_uint16()?;
        let revision = r.read_uint16()?;
        let vendor = r.read_uint32()?;
        let channel_count = r.read_uint16()?;
        let sample_size = r.read_uint16()?;
        let compression_id = r.read_int16()?;
        let packet_size = r.read_uint16()?;
        let sample_rate = r.read_uint32()?;
        let extension_len = match sound_version {
            1 => 16,
            2 => 36,
            _ => 0,
        };
        let qt_extension = r.read_vec(extension_len)?;
        Ok(Self {
            reserved,
            data_reference_index,
            sound_version,
            revision,
            vendor,
            channel_count,
            sample_size,
            compression_id,
            packet_size,
            sample_rate,
            qt_extension,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate >> 16
    }
}

impl BoxContent for AudioSampleEntry {
    fn content_size(&self) -> u64 {
        28 + self.qt_extension.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_bytes(&self.reserved)?;
        w.write_uint16(self.data_reference_index)?;
        w.write_uint16(self.sound_version)?;
        w.write_uint16(self.revision)?;
        w.write_uint32(self.vendor)?;
        w.write_uint16(self.channel_count)?;
        w.write_uint16(self.sample_size)?;
        w.write_int16(self.compression_id)?;
        w.write_uint16(self.packet_size)?;
        w.write_uint32(self.sample_rate)?;
        w.write_bytes(&self.qt_extension)
    }
}

/// `rtp ` hint sample entry fields ahead of its child boxes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintSampleEntry {
    #[serde(skip)]
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    pub hint_track_version: u16,
    pub highest_compatible_version: u16,
    pub max_packet_size: u32,
}

impl HintSampleEntry {
    pub fn parse<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        Ok(Self {
            reserved: r.read_array::<6>()?,
            data_reference_index: r.read_uint16()?,
            hint_track_version: r.read_uint16()?,
            highest_compatible_version: r.read_uint16()?,
            max_packet_size: r.read_uint32()?,
        })
    }
}

impl BoxContent for HintSampleEntry {
    fn content_size(&self) -> u64 {
        16
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_bytes(&self.reserved)?;
        w.write_uint16(self.data_reference_index)?;
        w.write_uint16(self.hint_track_version)?;
        w.write_uint16(self.highest_compatible_version)?;
        w.write_uint32(self.max_packet_size)
    }
}

/// One run of the decoding-time table: `count` samples of `delta` ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeToSampleEntry {
    pub count: u32,
    pub delta: u32,
}

/// `stts`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimeToSampleBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<TimeToSampleEntry>,
}

impl TimeToSampleBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = r.read_uint32()?;
        let mut entries = Vec::with_capacity(bounded(count, remaining(r), 8));
        for _ in 0..count {
            entries.push(TimeToSampleEntry { count: r.read_uint32()?, delta: r.read_uint32()? });
        }
        Ok(Self { version, flags, entries })
    }
}

impl BoxContent for TimeToSampleBox {
    fn content_size(&self) -> u64 {
        8 + 8 * self.entries.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.entries.len() as u32)?;
        for e in &self.entries {
            w.write_uint32(e.count)?;
            w.write_uint32(e.delta)?;
        }
        Ok(())
    }
}

/// Composition offset run. Version 0 offsets are unsigned on the wire; the
/// bits are kept either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompositionOffsetEntry {
    pub count: u32,
    pub offset: i32,
}

/// `ctts`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CompositionTimeToSampleBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<CompositionOffsetEntry>,
}

impl CompositionTimeToSampleBox {
    /// Version 1 when any offset is negative.
    pub fn new(entries: Vec<CompositionOffsetEntry>) -> Self {
        let version = entries.iter().any(|e| e.offset < 0) as u8;
        Self { version, flags: 0, entries }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = r.read_uint32()?;
        let mut entries = Vec::with_capacity(bounded(count, remaining(r), 8));
        for _ in 0..count {
            entries.push(CompositionOffsetEntry { count: r.read_uint32()?, offset: r.read_int32()? });
        }
        Ok(Self { version, flags, entries })
    }
}

impl BoxContent for CompositionTimeToSampleBox {
    fn content_size(&self) -> u64 {
        8 + 8 * self.entries.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.entries.len() as u32)?;
        for e in &self.entries {
            w.write_uint32(e.count)?;
            w.write_int32(e.offset)?;
        }
        Ok(())
    }
}

/// `stss`: 1-based sync sample numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SyncSampleBox {
    pub version: u8,
    pub flags: u32,
    pub sample_numbers: Vec<u32>,
}

impl SyncSampleBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = r.read_uint32()?;
        let mut sample_numbers = Vec::with_capacity(bounded(count, remaining(r), 4));
        for _ in 0..count {
            sample_numbers.push(r.read_uint32()?);
        }
        Ok(Self { version, flags, sample_numbers })
    }
}

impl BoxContent for SyncSampleBox {
    fn content_size(&self) -> u64 {
        8 + 4 * self.sample_numbers.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.sample_numbers.len() as u32)?;
        for &n in &self.sample_numbers {
            w.write_uint32(n)?;
        }
        Ok(())
    }
}

/// Per-sample dependency flags, two bits each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SampleDependency {
    pub is_leading: u8,
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
}

/// `sdtp`: one byte per sample, the count is implied by the box size.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SampleDependencyTypeBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SampleDependency>,
}

impl SampleDependencyTypeBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = remaining(r) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut bits = BitReader::new(r);
        for _ in 0..count {
            entries.push(SampleDependency {
                is_leading: bits.read_bits(2)? as u8,
                depends_on: bits.read_bits(2)? as u8,
                is_depended_on: bits.read_bits(2)? as u8,
                has_redundancy: bits.read_bits(2)? as u8,
            });
        }
        Ok(Self { version, flags, entries })
    }
}

impl BoxContent for SampleDependencyTypeBox {
    fn content_size(&self) -> u64 {
        4 + self.entries.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        let mut bits = BitWriter::new(w);
        for e in &self.entries {
            bits.write_bits(e.is_leading as u32, 2)?;
            bits.write_bits(e.depends_on as u32, 2)?;
            bits.write_bits(e.is_depended_on as u32, 2)?;
            bits.write_bits(e.has_redundancy as u32, 2)?;
        }
        bits.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// `stsc`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SampleToChunkBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SampleToChunkEntry>,
}

impl SampleToChunkBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = r.read_uint32()?;
        let mut entries = Vec::with_capacity(bounded(count, remaining(r), 12));
        for _ in 0..count {
            entries.push(SampleToChunkEntry {
                first_chunk: r.read_uint32()?,
                samples_per_chunk: r.read_uint32()?,
                sample_description_index: r.read_uint32()?,
            });
        }
        Ok(Self { version, flags, entries })
    }

    /// Samples per chunk for each of `chunk_count` chunks.
    pub fn expand(&self, chunk_count: usize) -> Vec<u32> {
        let mut out = Vec::with_capacity(chunk_count);
        for (i, e) in self.entries.iter().enumerate() {
            let end = self
                .entries
                .get(i + 1)
                .map_or(chunk_count, |n| (n.first_chunk as usize).saturating_sub(1));
            let start = (e.first_chunk as usize).saturating_sub(1);
            for _ in start..end.min(chunk_count) {
                out.push(e.samples_per_chunk);
            }
        }
        out
    }
}

impl BoxContent for SampleToChunkBox {
    fn content_size(&self) -> u64 {
        8 + 12 * self.entries.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.entries.len() as u32)?;
        for e in &self.entries {
            w.write_uint32(e.first_chunk)?;
            w.write_uint32(e.samples_per_chunk)?;
            w.write_uint32(e.sample_description_index)?;
        }
        Ok(())
    }
}

/// `stsz`: either one constant size or a per-sample list.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SampleSizeBox {
    pub version: u8,
    pub flags: u32,
    /// Non-zero when every sample has this size.
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

impl SampleSizeBox {
    pub fn from_sizes(sizes: Vec<u32>) -> Self {
        Self {
            version: 0,
            flags: 0,
            sample_size: 0,
            sample_count: sizes.len() as u32,
            entry_sizes: sizes,
        }
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let sample_size = r.read_uint32()?;
        let sample_count = r.read_uint32()?;
        let mut entry_sizes = Vec::new();
        if sample_size == 0 {
            entry_sizes.reserve(bounded(sample_count, remaining(r), 4));
            for _ in 0..sample_count {
                entry_sizes.push(r.read_uint32()?);
            }
        }
        Ok(Self { version, flags, sample_size, sample_count, entry_sizes })
    }

    pub fn size_of(&self, index: usize) -> Option<u32> {
        if self.sample_size != 0 {
            (index < self.sample_count as usize).then_some(self.sample_size)
        } else {
            self.entry_sizes.get(index).copied()
        }
    }
}

impl BoxContent for SampleSizeBox {
    fn content_size(&self) -> u64 {
        12 + if self.sample_size == 0 { 4 * self.entry_sizes.len() as u64 } else { 0 }
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.sample_size)?;
        if self.sample_size == 0 {
            w.write_uint32(self.entry_sizes.len() as u32)?;
            for &s in &self.entry_sizes {
                w.write_uint32(s)?;
            }
        } else {
            w.write_uint32(self.sample_count)?;
        }
        Ok(())
    }
}

/// `stco` (32-bit) or `co64` (64-bit) chunk offsets.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChunkOffsetBox {
    pub version: u8,
    pub flags: u32,
    pub large: bool,
    pub offsets: Vec<u64>,
}

impl ChunkOffsetBox {
    pub fn new(offsets: Vec<u64>, large: bool) -> Self {
        Self { version: 0, flags: 0, large, offsets }
    }

    pub fn parse_stco(r: &mut Cursor<&[u8]>) -> Result<Self> {
        Self::parse(r, false)
    }

    pub fn parse_co64(r: &mut Cursor<&[u8]>) -> Result<Self> {
        Self::parse(r, true)
    }

    fn parse(r: &mut Cursor<&[u8]>, large: bool) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let count = r.read_uint32()?;
        let mut offsets = Vec::with_capacity(bounded(count, remaining(r), if large { 8 } else { 4 }));
        for _ in 0..count {
            offsets.push(if large { r.read_uint64()? } else { r.read_uint32()? as u64 });
        }
        Ok(Self { version, flags, large, offsets })
    }

    pub fn fourcc(&self) -> [u8; 4] {
        if self.large { *b"co64" } else { *b"stco" }
    }

    pub fn fits_u32(&self) -> bool {
        self.offsets.iter().all(|&o| o <= u32::MAX as u64)
    }
}

impl BoxContent for ChunkOffsetBox {
    fn content_size(&self) -> u64 {
        let width = if self.large { 8 } else { 4 };
        8 + width * self.offsets.len() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.offsets.len() as u32)?;
        for &o in &self.offsets {
            if self.large {
                w.write_uint64(o)?;
            } else {
                w.write_uint32(o as u32)?;
            }
        }
        Ok(())
    }
}

/// Capacity hint that a hostile entry count cannot inflate past the data.
fn bounded(count: u32, remaining: u64, entry_size: u64) -> usize {
    (count as u64).min(remaining / entry_size) as usize
}
