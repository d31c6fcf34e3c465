use crate::boxes::{BoxData, BoxTree, ContainerPrefix, NodeId};
use crate::iso_file::IsoFile;
use crate::known_boxes::KnownBox;
use crate::source::{ByteSource, ReaderSource};
use crate::util::hex_dump;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// A JSON-serializable view of one box and its subtree.
///
/// Used by `mp4dump --json` and by UIs that want the tree without linking
/// the box types.
#[derive(Debug, Serialize)]
pub struct JsonBox {
    pub offset: u64,
    pub size: u64,
    pub header_size: u64,
    pub payload_offset: u64,
    pub payload_size: u64,

    pub typ: String,
    pub uuid: Option<String>,
    pub version: Option<u8>,
    pub flags: Option<u32>,
    pub kind: &'static str,
    pub full_name: &'static str,
    /// Decoded fields, when requested and the type has a structured form.
    pub fields: Option<Value>,
    pub children: Option<Vec<JsonBox>>,
}

fn kind_label(data: &BoxData) -> &'static str {
    match data {
        BoxData::Container(_) => "container",
        BoxData::MediaData(_) => "media",
        BoxData::Raw(_) => "raw",
        other if other.full_header().is_some() => "full",
        _ => "leaf",
    }
}

/// Structured fields of a box as JSON, `None` for raw content.
pub fn box_fields(data: &BoxData) -> Option<Value> {
    let value = match data {
        BoxData::Container(c) => match &c.prefix {
            ContainerPrefix::Visual(v) => serde_json::to_value(v),
            ContainerPrefix::Audio(a) => serde_json::to_value(a),
            ContainerPrefix::Hint(h) => serde_json::to_value(h),
            _ => return None,
        },
        BoxData::FileType(b) => serde_json::to_value(b),
        BoxData::MovieHeader(b) => serde_json::to_value(b),
        BoxData::TrackHeader(b) => serde_json::to_value(b),
        BoxData::MediaHeader(b) => serde_json::to_value(b),
        BoxData::Handler(b) => serde_json::to_value(b),
        BoxData::VideoMediaHeader(b) => serde_json::to_value(b),
        BoxData::SoundMediaHeader(b) => serde_json::to_value(b),
        BoxData::HintMediaHeader(b) => serde_json::to_value(b),
        BoxData::NullMediaHeader(b) => serde_json::to_value(b),
        BoxData::DataEntryUrl(b) => serde_json::to_value(b),
        BoxData::DataEntryUrn(b) => serde_json::to_value(b),
        BoxData::EditList(b) => serde_json::to_value(b),
        BoxData::Xml(b) => serde_json::to_value(b),
        BoxData::TimeToSample(b) => serde_json::to_value(b),
        BoxData::CompositionTimeToSample(b) => serde_json::to_value(b),
        BoxData::SyncSample(b) => serde_json::to_value(b),
        BoxData::SampleDependencyType(b) => serde_json::to_value(b),
        BoxData::SampleToChunk(b) => serde_json::to_value(b),
        BoxData::SampleSize(b) => serde_json::to_value(b),
        BoxData::ChunkOffset(b) => serde_json::to_value(b),
        BoxData::TrackFragmentHeader(b) => serde_json::to_value(b),
        BoxData::MovieFragmentHeader(b) => serde_json::to_value(b),
        BoxData::SampleEncryption(b) => serde_json::to_value(b),
        BoxData::MediaData(_) | BoxData::Raw(_) => return None,
    };
    value.ok()
}

pub fn box_to_json(tree: &BoxTree, id: NodeId, decode: bool) -> JsonBox {
    let node = tree.node(id);
    let offset = tree.offset_of(id);
    let size = tree.size(id);
    let header_size = tree.header_size(id);
    let (version, flags) = node.data.full_header().unzip();
    let children = node.data.is_container().then(|| {
        tree.children(id).iter().map(|&c| box_to_json(tree, c, decode)).collect()
    });

    JsonBox {
        offset,
        size,
        header_size,
        payload_offset: offset + header_size,
        payload_size: size - header_size,
        typ: node.typ.to_string(),
        uuid: node.uuid.map(hex::encode),
        version,
        flags,
        kind: kind_label(&node.data),
        full_name: KnownBox::from(node.typ).full_name(),
        fields: if decode { box_fields(&node.data) } else { None },
        children,
    }
}

pub fn tree_to_json(tree: &BoxTree, decode: bool) -> Vec<JsonBox> {
    tree.roots().iter().map(|&r| box_to_json(tree, r, decode)).collect()
}

/// Parse a file and return its box tree as JSON-ready values.
pub fn analyze_file(path: impl AsRef<Path>, decode: bool) -> anyhow::Result<Vec<JsonBox>> {
    let file = IsoFile::open(path)?;
    Ok(tree_to_json(file.boxes(), decode))
}

#[derive(Debug, Serialize)]
pub struct HexDump {
    pub offset: u64,
    pub length: u64,
    pub hex: String,
}

/// Hex-dump up to `max_len` bytes of a file starting at `offset`.
///
/// Never reads past EOF; `length` is the number of bytes actually dumped.
///
/// ```no_run
/// use mp4forge::hex_range;
///
/// fn main() -> anyhow::Result<()> {
///     let dump = hex_range("video.mp4", 0, 256)?;
///     println!("{}", dump.hex);
///     Ok(())
/// }
/// ```
pub fn hex_range<P: AsRef<Path>>(path: P, offset: u64, max_len: u64) -> anyhow::Result<HexDump> {
    let source = ReaderSource::open(path)?;
    let length = source.len().saturating_sub(offset).min(max_len);
    if length == 0 {
        return Ok(HexDump { offset, length: 0, hex: String::new() });
    }
    let data = source.read_range(offset, length)?;
    Ok(HexDump { offset, length, hex: hex_dump(&data, offset) })
}
