use crate::boxes::{BoxData, BoxKey};
use crate::error::Result;
use crate::fragment::{
    MovieFragmentHeaderBox, PIFF_SAMPLE_ENCRYPTION, SampleEncryptionBox, TrackFragmentHeaderBox,
};
use crate::known_boxes::KnownBox;
use crate::movie_boxes::{
    DataEntryUrlBox, DataEntryUrnBox, EditListBox, FileTypeBox, HandlerBox, HintMediaHeaderBox,
    MediaHeaderBox, MovieHeaderBox, NullMediaHeaderBox, SoundMediaHeaderBox, TrackHeaderBox,
    VideoMediaHeaderBox, XmlBox,
};
use crate::sample_table::{
    ChunkOffsetBox, CompositionTimeToSampleBox, SampleDependencyTypeBox, SampleSizeBox,
    SampleToChunkBox, SyncSampleBox, TimeToSampleBox,
};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

/// Decodes the content of a leaf box. The cursor covers exactly the
/// declared content; whatever the function leaves unread is kept as
/// trailing bytes.
pub type ParseFn = fn(&mut Cursor<&[u8]>) -> Result<BoxData>;

/// Fixed fields a container reads before its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixKind {
    Plain,
    Full,
    Counted,
    Visual,
    Audio,
    Hint,
}

/// How the parser treats a box type.
#[derive(Clone, Copy)]
pub enum BoxKind {
    Container(PrefixKind),
    Leaf(ParseFn),
    /// `mdat`: always kept as a lazy range over the source.
    MediaData,
    /// Raw pass-through.
    Opaque,
}

impl fmt::Debug for BoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxKind::Container(p) => write!(f, "Container({p:?})"),
            BoxKind::Leaf(_) => write!(f, "Leaf"),
            BoxKind::MediaData => write!(f, "MediaData"),
            BoxKind::Opaque => write!(f, "Opaque"),
        }
    }
}

/// Registry of box kinds keyed by `BoxKey` (4CC or UUID).
///
/// Build it fluently with [`Registry::with_kind`]; keys that were never
/// registered parse as [`BoxKind::Opaque`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    map: HashMap<BoxKey, BoxKind>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Return a new registry with `key` mapped to `kind`, replacing any
    /// earlier mapping.
    pub fn with_kind(mut self, key: BoxKey, kind: BoxKind) -> Self {
        self.map.insert(key, kind);
        self
    }

    pub fn kind_of(&self, key: &BoxKey) -> BoxKind {
        self.map.get(key).copied().unwrap_or(BoxKind::Opaque)
    }

    pub fn contains(&self, key: &BoxKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn leaf_kind(kb: KnownBox) -> Option<ParseFn> {
    let f: ParseFn = match kb {
        KnownBox::Ftyp | KnownBox::Styp => |r| Ok(BoxData::FileType(FileTypeBox::parse(r)?)),
        KnownBox::Mvhd => |r| Ok(BoxData::MovieHeader(MovieHeaderBox::parse(r)?)),
        KnownBox::Tkhd => |r| Ok(BoxData::TrackHeader(TrackHeaderBox::parse(r)?)),
        KnownBox::Mdhd => |r| Ok(BoxData::MediaHeader(MediaHeaderBox::parse(r)?)),
        KnownBox::Hdlr => |r| Ok(BoxData::Handler(HandlerBox::parse(r)?)),
        KnownBox::Vmhd => |r| Ok(BoxData::VideoMediaHeader(VideoMediaHeaderBox::parse(r)?)),
        KnownBox::Smhd => |r| Ok(BoxData::SoundMediaHeader(SoundMediaHeaderBox::parse(r)?)),
        KnownBox::Hmhd => |r| Ok(BoxData::HintMediaHeader(HintMediaHeaderBox::parse(r)?)),
        KnownBox::Nmhd => |r| Ok(BoxData::NullMediaHeader(NullMediaHeaderBox::parse(r)?)),
        KnownBox::Url => |r| Ok(BoxData::DataEntryUrl(DataEntryUrlBox::parse(r)?)),
        KnownBox::Urn => |r| Ok(BoxData::DataEntryUrn(DataEntryUrnBox::parse(r)?)),
        KnownBox::Elst => |r| Ok(BoxData::EditList(EditListBox::parse(r)?)),
        KnownBox::Xml => |r| Ok(BoxData::Xml(XmlBox::parse(r)?)),
        KnownBox::Stts => |r| Ok(BoxData::TimeToSample(TimeToSampleBox::parse(r)?)),
        KnownBox::Ctts => {
            |r| Ok(BoxData::CompositionTimeToSample(CompositionTimeToSampleBox::parse(r)?))
        }
        KnownBox::Stss => |r| Ok(BoxData::SyncSample(SyncSampleBox::parse(r)?)),
        KnownBox::Sdtp => {
            |r| Ok(BoxData::SampleDependencyType(SampleDependencyTypeBox::parse(r)?))
        }
        KnownBox::Stsc => |r| Ok(BoxData::SampleToChunk(SampleToChunkBox::parse(r)?)),
        KnownBox::Stsz => |r| Ok(BoxData::SampleSize(SampleSizeBox::parse(r)?)),
        KnownBox::Stco => |r| Ok(BoxData::ChunkOffset(ChunkOffsetBox::parse_stco(r)?)),
        KnownBox::Co64 => |r| Ok(BoxData::ChunkOffset(ChunkOffsetBox::parse_co64(r)?)),
        KnownBox::Tfhd => {
            |r| Ok(BoxData::TrackFragmentHeader(TrackFragmentHeaderBox::parse(r)?))
        }
        KnownBox::Mfhd => {
            |r| Ok(BoxData::MovieFragmentHeader(MovieFragmentHeaderBox::parse(r)?))
        }
        KnownBox::Senc => parse_sample_encryption,
        _ => return None,
    };
    Some(f)
}

fn parse_sample_encryption(r: &mut Cursor<&[u8]>) -> Result<BoxData> {
    Ok(BoxData::SampleEncryption(SampleEncryptionBox::parse(r)?))
}

/// The kind the default registry assigns to a known box, if any.
pub fn default_kind(kb: KnownBox) -> Option<BoxKind> {
    if kb == KnownBox::Mdat {
        return Some(BoxKind::MediaData);
    }
    if kb.is_container() {
        return Some(BoxKind::Container(PrefixKind::Plain));
    }
    if kb.is_counted_container() {
        return Some(BoxKind::Container(PrefixKind::Counted));
    }
    if kb.is_visual_sample_entry() {
        return Some(BoxKind::Container(PrefixKind::Visual));
    }
    if kb.is_audio_sample_entry() {
        return Some(BoxKind::Container(PrefixKind::Audio));
    }
    if kb == KnownBox::Rtp {
        return Some(BoxKind::Container(PrefixKind::Hint));
    }
    leaf_kind(kb).map(BoxKind::Leaf)
}

// ---------- Default registry ----------
pub fn default_registry() -> Registry {
    let reg = KnownBox::ALL
        .iter()
        .filter_map(|&kb| default_kind(kb).map(|k| (kb.fourcc(), k)))
        .fold(Registry::new(), |reg, (cc, kind)| reg.with_kind(BoxKey::FourCC(cc), kind));
    reg.with_kind(
        BoxKey::Uuid(PIFF_SAMPLE_ENCRYPTION),
        BoxKind::Leaf(parse_sample_encryption),
    )
}

