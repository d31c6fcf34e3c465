use crate::cursor::WriteIsoExt;
use crate::error::{Error, Result};
use crate::fragment::{MovieFragmentHeaderBox, SampleEncryptionBox, TrackFragmentHeaderBox};
use crate::mdat::MediaDataBox;
use crate::movie_boxes::{
    DataEntryUrlBox, DataEntryUrnBox, EditListBox, FileTypeBox, HandlerBox, HintMediaHeaderBox,
    MediaHeaderBox, MovieHeaderBox, NullMediaHeaderBox, SoundMediaHeaderBox, TrackHeaderBox,
    VideoMediaHeaderBox, XmlBox,
};
use crate::sample_table::{
    AudioSampleEntry, ChunkOffsetBox, CompositionTimeToSampleBox, HintSampleEntry,
    SampleDependencyTypeBox, SampleSizeBox, SampleToChunkBox, SyncSampleBox, TimeToSampleBox,
    VisualSampleEntry,
};
use crate::source::Payload;
use bytes::Bytes;
use std::fmt;
use std::io::Write;

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");

    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(b: [u8; 4]) -> Self {
        FourCC(b)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(b: &[u8; 4]) -> Self {
        FourCC(*b)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

/// Registry lookup key: the 4CC, or the extended type for `uuid` boxes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl BoxKey {
    pub fn new(typ: FourCC, uuid: Option<[u8; 16]>) -> Self {
        match uuid {
            Some(u) if typ == FourCC::UUID => BoxKey::Uuid(u),
            _ => BoxKey::FourCC(typ),
        }
    }
}

/// The header as it was found in the source.
#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub size: u64,        // total size including header, or 0 = to end of stream
    pub typ: FourCC,      // 4CC or b"uuid"
    pub uuid: Option<[u8; 16]>,
    pub header_size: u64, // 8, 16, 24 or 32
    pub start: u64,       // offset of the first size byte
    pub large: bool,      // size field was the `1` sentinel
}

impl BoxHeader {
    pub fn content_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size)
    }
}

/// A box whose content must use the 64-bit size form.
pub fn needs_large_size(content_size: u64, uuid: bool) -> bool {
    let compact = 8 + if uuid { 16 } else { 0 };
    content_size.saturating_add(compact) >= u32::MAX as u64
}

pub fn header_size_for(content_size: u64, uuid: bool, force_large: bool) -> u64 {
    let large = force_large || needs_large_size(content_size, uuid);
    8 + if large { 8 } else { 0 } + if uuid { 16 } else { 0 }
}

/// Writes a size/type header for `content_size` bytes of content and
/// returns the header length.
pub fn write_header<W: Write + ?Sized>(
    w: &mut W,
    typ: FourCC,
    uuid: Option<&[u8; 16]>,
    content_size: u64,
    force_large: bool,
) -> Result<u64> {
    let header_size = header_size_for(content_size, uuid.is_some(), force_large);
    let total = header_size + content_size;
    if header_size == 8 || header_size == 24 {
        w.write_uint32(total as u32)?;
        w.write_fourcc(typ)?;
    } else {
        w.write_uint32(1)?;
        w.write_fourcc(typ)?;
        w.write_uint64(total)?;
    }
    if let Some(u) = uuid {
        w.write_bytes(u)?;
    }
    Ok(header_size)
}

/// Encode / size contract shared by every leaf box variant.
///
/// `write_content` must emit exactly `content_size` bytes; the header is
/// written separately by [`write_header`].
pub trait BoxContent {
    fn content_size(&self) -> u64;
    fn write_content(&self, w: &mut dyn Write) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed fields a container carries before its first child.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerPrefix {
    Plain,
    /// Version and flags, e.g. `meta`.
    Full { version: u8, flags: u32 },
    /// Version, flags and an entry count equal to the number of children
    /// (`stsd`, `dref`).
    Counted { version: u8, flags: u32 },
    Visual(VisualSampleEntry),
    Audio(AudioSampleEntry),
    Hint(HintSampleEntry),
}

impl ContainerPrefix {
    pub fn size(&self) -> u64 {
        match self {
            ContainerPrefix::Plain => 0,
            ContainerPrefix::Full { .. } => 4,
            ContainerPrefix::Counted { .. } => 8,
            ContainerPrefix::Visual(v) => v.content_size(),
            ContainerPrefix::Audio(a) => a.content_size(),
            ContainerPrefix::Hint(h) => h.content_size(),
        }
    }

    pub fn visual(&self) -> Option<&VisualSampleEntry> {
        match self {
            ContainerPrefix::Visual(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioSampleEntry> {
        match self {
            ContainerPrefix::Audio(a) => Some(a),
            _ => None,
        }
    }

    fn write(&self, w: &mut dyn Write, child_count: usize) -> Result<()> {
        match self {
            ContainerPrefix::Plain => Ok(()),
            ContainerPrefix::Full { version, flags } => w.write_full_header(*version, *flags),
            ContainerPrefix::Counted { version, flags } => {
                w.write_full_header(*version, *flags)?;
                w.write_uint32(child_count as u32)
            }
            ContainerPrefix::Visual(v) => v.write_content(w),
            ContainerPrefix::Audio(a) => a.write_content(w),
            ContainerPrefix::Hint(h) => h.write_content(w),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContainerBox {
    pub prefix: ContainerPrefix,
    pub children: Vec<NodeId>,
}

/// Opaque pass-through content of a box this crate does not interpret.
#[derive(Debug, Clone)]
pub struct RawBox {
    pub payload: Payload,
}

impl BoxContent for RawBox {
    fn content_size(&self) -> u64 {
        self.payload.len()
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        self.payload.write_to(w)
    }
}

/// Kind-specific content of a box.
#[derive(Debug, Clone)]
pub enum BoxData {
    Container(ContainerBox),
    FileType(FileTypeBox),
    MovieHeader(MovieHeaderBox),
    TrackHeader(TrackHeaderBox),
    MediaHeader(MediaHeaderBox),
    Handler(HandlerBox),
    VideoMediaHeader(VideoMediaHeaderBox),
    SoundMediaHeader(SoundMediaHeaderBox),
    HintMediaHeader(HintMediaHeaderBox),
    NullMediaHeader(NullMediaHeaderBox),
    DataEntryUrl(DataEntryUrlBox),
    DataEntryUrn(DataEntryUrnBox),
    EditList(EditListBox),
    Xml(XmlBox),
    TimeToSample(TimeToSampleBox),
    CompositionTimeToSample(CompositionTimeToSampleBox),
    SyncSample(SyncSampleBox),
    SampleDependencyType(SampleDependencyTypeBox),
    SampleToChunk(SampleToChunkBox),
    SampleSize(SampleSizeBox),
    ChunkOffset(ChunkOffsetBox),
    TrackFragmentHeader(TrackFragmentHeaderBox),
    MovieFragmentHeader(MovieFragmentHeaderBox),
    SampleEncryption(SampleEncryptionBox),
    MediaData(MediaDataBox),
    Raw(RawBox),
}

impl BoxData {
    pub fn container(prefix: ContainerPrefix) -> Self {
        BoxData::Container(ContainerBox { prefix, children: Vec::new() })
    }

    pub fn plain_container() -> Self {
        Self::container(ContainerPrefix::Plain)
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        BoxData::Raw(RawBox { payload: Payload::Memory(bytes.into()) })
    }

    pub fn is_container(&self) -> bool {
        matches!(self, BoxData::Container(_))
    }

    /// The leaf codec, or `None` for containers.
    pub fn as_content(&self) -> Option<&dyn BoxContent> {
        let content: &dyn BoxContent = match self {
            BoxData::Container(_) => return None,
            BoxData::FileType(b) => b,
            BoxData::MovieHeader(b) => b,
            BoxData::TrackHeader(b) => b,
            BoxData::MediaHeader(b) => b,
            BoxData::Handler(b) => b,
            BoxData::VideoMediaHeader(b) => b,
            BoxData::SoundMediaHeader(b) => b,
            BoxData::HintMediaHeader(b) => b,
            BoxData::NullMediaHeader(b) => b,
            BoxData::DataEntryUrl(b) => b,
            BoxData::DataEntryUrn(b) => b,
            BoxData::EditList(b) => b,
            BoxData::Xml(b) => b,
            BoxData::TimeToSample(b) => b,
            BoxData::CompositionTimeToSample(b) => b,
            BoxData::SyncSample(b) => b,
            BoxData::SampleDependencyType(b) => b,
            BoxData::SampleToChunk(b) => b,
            BoxData::SampleSize(b) => b,
            BoxData::ChunkOffset(b) => b,
            BoxData::TrackFragmentHeader(b) => b,
            BoxData::MovieFragmentHeader(b) => b,
            BoxData::SampleEncryption(b) => b,
            BoxData::MediaData(b) => b,
            BoxData::Raw(b) => b,
        };
        Some(content)
    }

    /// Version and flags for variants that are full boxes.
    pub fn full_header(&self) -> Option<(u8, u32)> {
        match self {
            BoxData::Container(c) => match &c.prefix {
                ContainerPrefix::Full { version, flags }
                | ContainerPrefix::Counted { version, flags } => Some((*version, *flags)),
                _ => None,
            },
            BoxData::MovieHeader(b) => Some((b.version, b.flags)),
            BoxData::TrackHeader(b) => Some((b.version, b.flags)),
            BoxData::MediaHeader(b) => Some((b.version, b.flags)),
            BoxData::Handler(b) => Some((b.version, b.flags)),
            BoxData::VideoMediaHeader(b) => Some((b.version, b.flags)),
            BoxData::SoundMediaHeader(b) => Some((b.version, b.flags)),
            BoxData::HintMediaHeader(b) => Some((b.version, b.flags)),
            BoxData::NullMediaHeader(b) => Some((b.version, b.flags)),
            BoxData::DataEntryUrl(b) => Some((b.version, b.flags)),
            BoxData::DataEntryUrn(b) => Some((b.version, b.flags)),
            BoxData::EditList(b) => Some((b.version, b.flags)),
            BoxData::Xml(b) => Some((b.version, b.flags)),
            BoxData::TimeToSample(b) => Some((b.version, b.flags)),
            BoxData::CompositionTimeToSample(b) => Some((b.version, b.flags)),
            BoxData::SyncSample(b) => Some((b.version, b.flags)),
            BoxData::SampleDependencyType(b) => Some((b.version, b.flags)),
            BoxData::SampleToChunk(b) => Some((b.version, b.flags)),
            BoxData::SampleSize(b) => Some((b.version, b.flags)),
            BoxData::ChunkOffset(b) => Some((b.version, b.flags)),
            BoxData::MovieFragmentHeader(b) => Some((b.version, b.flags)),
            BoxData::TrackFragmentHeader(b) => Some((b.version, b.flags())),
            BoxData::SampleEncryption(b) => Some((b.version, b.flags())),
            BoxData::FileType(_) | BoxData::MediaData(_) | BoxData::Raw(_) => None,
        }
    }
}

/// One box in a [`BoxTree`].
#[derive(Debug, Clone)]
pub struct BoxNode {
    pub typ: FourCC,
    pub uuid: Option<[u8; 16]>,
    /// Offset in the source this node was parsed from; `None` when built.
    pub offset: Option<u64>,
    pub parent: Option<NodeId>,
    /// Keep the 64-bit size form even when the compact form would fit.
    pub large_size: bool,
    pub data: BoxData,
    /// Bytes after the variant's content that it did not interpret.
    pub trailing: Bytes,
}

impl BoxNode {
    pub fn new(typ: FourCC, data: BoxData) -> Self {
        Self {
            typ,
            uuid: None,
            offset: None,
            parent: None,
            large_size: false,
            data,
            trailing: Bytes::new(),
        }
    }

    pub fn key(&self) -> BoxKey {
        BoxKey::new(self.typ, self.uuid)
    }
}

/// Arena of boxes. Containers own their children through [`NodeId`]s; the
/// parent link on each node is for lookup only.
///
/// Sizes are never stored: [`BoxTree::size`] recomputes them from the
/// current fields, so edits can never leave a stale size behind.
#[derive(Debug, Clone, Default)]
pub struct BoxTree {
    nodes: Vec<BoxNode>,
    roots: Vec<NodeId>,
}

impl BoxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Panics if `id` did not come from this tree.
    pub fn node(&self, id: NodeId) -> &BoxNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut BoxNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&BoxNode> {
        self.nodes.get(id.0)
    }

    /// Append `node` at the end of `parent`'s children, or of the root list.
    pub fn add_node(&mut self, parent: Option<NodeId>, mut node: BoxNode) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        match parent {
            None => self.roots.push(id),
            Some(p) => match self.nodes.get_mut(p.0).map(|n| &mut n.data) {
                Some(BoxData::Container(c)) => c.children.push(id),
                Some(_) => {
                    return Err(Error::tree(format!(
                        "{} is not a container",
                        self.nodes[p.0].typ
                    )));
                }
                None => return Err(Error::tree(format!("no node {}", p.0))),
            },
        }
        self.nodes.push(node);
        Ok(id)
    }

    pub fn add_root(&mut self, typ: impl Into<FourCC>, data: BoxData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(BoxNode::new(typ.into(), data));
        self.roots.push(id);
        id
    }

    pub fn add_child(
        &mut self,
        parent: NodeId,
        typ: impl Into<FourCC>,
        data: BoxData,
    ) -> Result<NodeId> {
        self.add_node(Some(parent), BoxNode::new(typ.into(), data))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).data {
            BoxData::Container(c) => &c.children,
            _ => &[],
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn child_of_type(&self, id: NodeId, typ: &[u8; 4]) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.node(c).typ.0 == *typ)
    }

    pub fn children_of_type(&self, id: NodeId, typ: &[u8; 4]) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.node(c).typ.0 == *typ)
            .collect()
    }

    pub fn root_of_type(&self, typ: &[u8; 4]) -> Option<NodeId> {
        self.roots.iter().copied().find(|&r| self.node(r).typ.0 == *typ)
    }

    /// Follow a `/`-separated 4CC path, e.g. `"moov/trak/mdia"`, taking the
    /// first match at each level. `from = None` starts at the root list.
    pub fn find_path(&self, from: Option<NodeId>, path: &str) -> Option<NodeId> {
        let mut current = from;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let cc = FourCC::from_str(part)?;
            current = Some(match current {
                None => self.root_of_type(&cc.0)?,
                Some(id) => self.child_of_type(id, &cc.0)?,
            });
        }
        current
    }

    /// Every node of type `typ`, depth first in file order.
    pub fn find_all(&self, typ: &[u8; 4]) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.node(id).typ.0 == *typ {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn content_size(&self, id: NodeId) -> u64 {
        let node = self.node(id);
        let body = match &node.data {
            BoxData::Container(c) => {
                c.prefix.size() + c.children.iter().map(|&k| self.size(k)).sum::<u64>()
            }
            leaf => leaf.as_content().map_or(0, |b| b.content_size()),
        };
        body + node.trailing.len() as u64
    }

    pub fn header_size(&self, id: NodeId) -> u64 {
        let node = self.node(id);
        header_size_for(self.content_size(id), node.uuid.is_some(), node.large_size)
    }

    pub fn size(&self, id: NodeId) -> u64 {
        let node = self.node(id);
        let content = self.content_size(id);
        header_size_for(content, node.uuid.is_some(), node.large_size) + content
    }

    pub fn total_size(&self) -> u64 {
        self.roots.iter().map(|&r| self.size(r)).sum()
    }

    /// Offset of `id` in the serialized output of this tree.
    pub fn offset_of(&self, id: NodeId) -> u64 {
        let node = self.node(id);
        let (base, siblings) = match node.parent {
            None => (0, &self.roots[..]),
            Some(p) => {
                let prefix = match &self.node(p).data {
                    BoxData::Container(c) => c.prefix.size(),
                    _ => 0,
                };
                (self.offset_of(p) + self.header_size(p) + prefix, self.children(p))
            }
        };
        base + siblings
            .iter()
            .take_while(|&&s| s != id)
            .map(|&s| self.size(s))
            .sum::<u64>()
    }

    /// Serialize one box (header, content, trailing bytes) depth first.
    pub fn write_node(&self, id: NodeId, w: &mut dyn Write) -> Result<()> {
        let node = self.node(id);
        let content = self.content_size(id);
        let mut out = CountingWriter { inner: w, count: 0 };
        let header = write_header(&mut out, node.typ, node.uuid.as_ref(), content, node.large_size)?;
        match &node.data {
            BoxData::Container(c) => {
                c.prefix.write(&mut out, c.children.len())?;
                for &child in &c.children {
                    self.write_node(child, &mut out)?;
                }
            }
            leaf => {
                if let Some(b) = leaf.as_content() {
                    b.write_content(&mut out)?;
                }
            }
        }
        out.write_bytes(&node.trailing)?;
        let expected = header + content;
        if out.count != expected {
            return Err(Error::SizeMismatch { typ: node.typ, expected, written: out.count });
        }
        Ok(())
    }

    /// Serialize all root boxes in order; returns the number of bytes written.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<u64> {
        let mut out = CountingWriter { inner: w, count: 0 };
        for &root in &self.roots {
            self.write_node(root, &mut out)?;
        }
        out.flush()?;
        Ok(out.count)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.total_size() as usize);
        self.write(&mut out)?;
        Ok(out)
    }

    /// Deep-copy `src_id` (and its subtree) from `src` under `parent`.
    pub fn graft(&mut self, parent: Option<NodeId>, src: &BoxTree, src_id: NodeId) -> Result<NodeId> {
        let mut node = src.node(src_id).clone();
        let src_children = match &mut node.data {
            BoxData::Container(c) => std::mem::take(&mut c.children),
            _ => Vec::new(),
        };
        let id = self.add_node(parent, node)?;
        for child in src_children {
            self.graft(Some(id), src, child)?;
        }
        Ok(id)
    }

    /// Copy of the subtree at `id` as a standalone tree with one root.
    pub fn extract(&self, id: NodeId) -> Result<BoxTree> {
        let mut out = BoxTree::new();
        out.graft(None, self, id)?;
        Ok(out)
    }
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
