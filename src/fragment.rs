//! Movie fragment headers and the sample encryption layout.
//!
//! Only the box layout is handled here; nothing is decrypted.

use crate::boxes::BoxContent;
use crate::cursor::{ReadIsoExt, WriteIsoExt, remaining};
use crate::error::Result;
use serde::Serialize;
use std::io::{Cursor, Write};

/// Extended type of the PIFF 1.1 sample encryption box.
pub const PIFF_SAMPLE_ENCRYPTION: [u8; 16] = [
    0xA2, 0x39, 0x4F, 0x52, 0x5A, 0x9B, 0x4F, 0x14, 0xA2, 0x44, 0x6C, 0x42, 0x7C, 0x64, 0x8D, 0xF4,
];

const TFHD_BASE_DATA_OFFSET: u32 = 0x01;
const TFHD_SAMPLE_DESCRIPTION_INDEX: u32 = 0x02;
const TFHD_DEFAULT_DURATION: u32 = 0x08;
const TFHD_DEFAULT_SIZE: u32 = 0x10;
const TFHD_DEFAULT_FLAGS: u32 = 0x20;
const TFHD_DURATION_IS_EMPTY: u32 = 0x01_0000;
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;
const TFHD_KNOWN: u32 = 0x03_003B;

/// `tfhd`. The flags are derived from which optional fields are present.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackFragmentHeaderBox {
    pub version: u8,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
    pub duration_is_empty: bool,
    pub default_base_is_moof: bool,
    /// Flag bits with no field of their own, kept as found.
    pub other_flags: u32,
}

impl TrackFragmentHeaderBox {
    pub fn flags(&self) -> u32 {
        let mut f = self.other_flags & !TFHD_KNOWN;
        let set = |f: &mut u32, on: bool, bit: u32| {
            if on {
                *f |= bit;
            }
        };
        set(&mut f, self.base_data_offset.is_some(), TFHD_BASE_DATA_OFFSET);
        set(&mut f, self.sample_description_index.is_some(), TFHD_SAMPLE_DESCRIPTION_INDEX);
        set(&mut f, self.default_sample_duration.is_some(), TFHD_DEFAULT_DURATION);
        set(&mut f, self.default_sample_size.is_some(), TFHD_DEFAULT_SIZE);
        set(&mut f, self.default_sample_flags.is_some(), TFHD_DEFAULT_FLAGS);
        set(&mut f, self.duration_is_empty, TFHD_DURATION_IS_EMPTY);
        set(&mut f, self.default_base_is_moof, TFHD_DEFAULT_BASE_IS_MOOF);
        f
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let track_id = r.read_uint32()?;
        let base_data_offset =
            if flags & TFHD_BASE_DATA_OFFSET != 0 { Some(r.read_uint64()?) } else { None };
        let mut opt_u32 = |bit: u32| -> Result<Option<u32>> {
            if flags & bit != 0 { Ok(Some(r.read_uint32()?)) } else { Ok(None) }
        };
        let sample_description_index = opt_u32(TFHD_SAMPLE_DESCRIPTION_INDEX)?;
        let default_sample_duration = opt_u32(TFHD_DEFAULT_DURATION)?;
        let default_sample_size = opt_u32(TFHD_DEFAULT_SIZE)?;
        let default_sample_flags = opt_u32(TFHD_DEFAULT_FLAGS)?;
        Ok(Self {
            version,
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
            duration_is_empty: flags & TFHD_DURATION_IS_EMPTY != 0,
            default_base_is_moof: flags & TFHD_DEFAULT_BASE_IS_MOOF != 0,
            other_flags: flags & !TFHD_KNOWN,
        })
    }
}

impl BoxContent for TrackFragmentHeaderBox {
    fn content_size(&self) -> u64 {
        let optional = [
            self.sample_description_index,
            self.default_sample_duration,
            self.default_sample_size,
            self.default_sample_flags,
        ];
        8 + self.base_data_offset.map_or(0, |_| 8)
            + 4 * optional.iter().filter(|o| o.is_some()).count() as u64
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags())?;
        w.write_uint32(self.track_id)?;
        if let Some(o) = self.base_data_offset {
            w.write_uint64(o)?;
        }
        for v in [
            self.sample_description_index,
            self.default_sample_duration,
            self.default_sample_size,
            self.default_sample_flags,
        ]
        .into_iter()
        .flatten()
        {
            w.write_uint32(v)?;
        }
        Ok(())
    }
}

/// `mfhd`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MovieFragmentHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub sequence_number: u32,
}

impl MovieFragmentHeaderBox {
    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        Ok(Self { version, flags, sequence_number: r.read_uint32()? })
    }
}

impl BoxContent for MovieFragmentHeaderBox {
    fn content_size(&self) -> u64 {
        8
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags)?;
        w.write_uint32(self.sequence_number)
    }
}

const SENC_OVERRIDE: u32 = 0x1;
const SENC_SUBSAMPLES: u32 = 0x2;

/// Track encryption defaults carried inline when flag 0x1 is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncryptionOverride {
    /// 24 bits on the wire.
    pub algorithm_id: u32,
    pub iv_size: u8,
    #[serde(serialize_with = "hex_bytes")]
    pub kid: [u8; 16],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubsampleEntry {
    pub clear_bytes: u16,
    pub encrypted_bytes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncryptedSample {
    #[serde(serialize_with = "hex_bytes")]
    pub iv: Vec<u8>,
    pub subsamples: Vec<SubsampleEntry>,
}

/// `senc`, or the PIFF `uuid` box with the same layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEncryptionBox {
    pub version: u8,
    pub encryption_override: Option<EncryptionOverride>,
    /// Every sample carries a sub-sample table (flag 0x2).
    pub uses_subsamples: bool,
    pub samples: Vec<EncryptedSample>,
    pub other_flags: u32,
}

impl SampleEncryptionBox {
    /// IV length when the box does not override it.
    pub const DEFAULT_IV_SIZE: u8 = 8;

    pub fn flags(&self) -> u32 {
        let mut f = self.other_flags & !(SENC_OVERRIDE | SENC_SUBSAMPLES);
        if self.encryption_override.is_some() {
            f |= SENC_OVERRIDE;
        }
        if self.uses_subsamples {
            f |= SENC_SUBSAMPLES;
        }
        f
    }

    pub fn iv_size(&self) -> u8 {
        self.encryption_override
            .as_ref()
            .map_or(Self::DEFAULT_IV_SIZE, |o| o.iv_size)
    }

    pub fn parse(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let (version, flags) = r.read_full_header()?;
        let encryption_override = if flags & SENC_OVERRIDE != 0 {
            Some(EncryptionOverride {
                algorithm_id: r.read_uint24()?,
                iv_size: r.read_uint8()?,
                kid: r.read_array::<16>()?,
            })
        } else {
            None
        };
        let iv_size = encryption_override
            .as_ref()
            .map_or(Self::DEFAULT_IV_SIZE, |o| o.iv_size) as usize;
        let uses_subsamples = flags & SENC_SUBSAMPLES != 0;
        let count = r.read_uint32()?;
        let mut samples = Vec::with_capacity((count as u64).min(remaining(r)) as usize);
        for _ in 0..count {
            let iv = r.read_vec(iv_size)?;
            let mut subsamples = Vec::new();
            if uses_subsamples {
                let n = r.read_uint16()?;
                for _ in 0..n {
                    subsamples.push(SubsampleEntry {
                        clear_bytes: r.read_uint16()?,
                        encrypted_bytes: r.read_uint32()?,
                    });
                }
            }
            samples.push(EncryptedSample { iv, subsamples });
        }
        Ok(Self {
            version,
            encryption_override,
            uses_subsamples,
            samples,
            other_flags: flags & !(SENC_OVERRIDE | SENC_SUBSAMPLES),
        })
    }
}

impl BoxContent for SampleEncryptionBox {
    fn content_size(&self) -> u64 {
        let header = 4 + self.encryption_override.as_ref().map_or(0, |_| 20) + 4;
        let per_sample: u64 = self
            .samples
            .iter()
            .map(|s| {
                let table = if self.uses_subsamples { 2 + 6 * s.subsamples.len() as u64 } else { 0 };
                s.iv.len() as u64 + table
            })
            .sum();
        header + per_sample
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        w.write_full_header(self.version, self.flags())?;
        if let Some(o) = &self.encryption_override {
            w.write_uint24(o.algorithm_id)?;
            w.write_uint8(o.iv_size)?;
            w.write_bytes(&o.kid)?;
        }
        w.write_uint32(self.samples.len() as u32)?;
        for s in &self.samples {
            w.write_bytes(&s.iv)?;
            if self.uses_subsamples {
                w.write_uint16(s.subsamples.len() as u16)?;
                for e in &s.subsamples {
                    w.write_uint16(e.clear_bytes)?;
                    w.write_uint32(e.encrypted_bytes)?;
                }
            }
        }
        Ok(())
    }
}

fn hex_bytes<T: AsRef<[u8]>, S: serde::Serializer>(
    b: &T,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(b.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tfhd_flags_follow_present_fields() {
        let tfhd = TrackFragmentHeaderBox {
            track_id: 1,
            default_sample_duration: Some(1024),
            default_base_is_moof: true,
            ..Default::default()
        };
        assert_eq!(tfhd.flags(), 0x02_0008);
        assert_eq!(tfhd.content_size(), 12);

        let mut out = Vec::new();
        tfhd.write_content(&mut out).unwrap();
        let parsed = TrackFragmentHeaderBox::parse(&mut Cursor::new(&out[..])).unwrap();
        assert_eq!(parsed, tfhd);
    }

    #[test]
    fn senc_defaults_to_eight_byte_ivs() {
        let mut bytes = vec![0u8, 0, 0, SENC_SUBSAMPLES as u8, 0, 0, 0, 1];
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        bytes.extend_from_slice(&[0, 1, 0, 16, 0, 0, 0, 100]);
        let senc = SampleEncryptionBox::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(senc.iv_size(), 8);
        assert_eq!(senc.samples[0].iv, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            senc.samples[0].subsamples,
            vec![SubsampleEntry { clear_bytes: 16, encrypted_bytes: 100 }]
        );
        assert_eq!(senc.content_size(), bytes.len() as u64);
    }

    #[test]
    fn senc_override_sets_iv_size() {
        let mut bytes = vec![0u8, 0, 0, SENC_OVERRIDE as u8, 0, 0, 1, 16];
        bytes.extend_from_slice(&[0xAB; 16]);
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        bytes.extend_from_slice(&[9u8; 16]);
        let senc = SampleEncryptionBox::parse(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(senc.iv_size(), 16);
        assert_eq!(senc.flags(), SENC_OVERRIDE);
        let mut out = Vec::new();
        senc.write_content(&mut out).unwrap();
        assert_eq!(out, bytes);
    }
}
