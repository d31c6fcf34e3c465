use crate::boxes::{BoxData, BoxHeader, BoxKey, BoxNode, BoxTree, ContainerPrefix, FourCC, NodeId};
use crate::cursor::{ReadIsoExt, remaining};
use crate::error::{Error, Result};
use crate::mdat::MediaDataBox;
use crate::registry::{BoxKind, PrefixKind, Registry};
use crate::sample_table::{AudioSampleEntry, HintSampleEntry, VisualSampleEntry};
use crate::source::{ByteSource, Payload, SourceReader};
use bytes::Bytes;
use std::io::{Cursor, Read, Seek};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Smallest possible box: 4-byte size plus 4-byte type.
pub const MIN_HEADER: u64 = 8;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Opaque payloads longer than this stay as lazy source ranges.
    pub lazy_threshold: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { lazy_threshold: 64 * 1024 }
    }
}

pub fn read_box_header<R: Read + Seek>(r: &mut R) -> Result<BoxHeader> {
    let start = r.stream_position()?;
    let size32 = r.read_uint32()?;
    let typ = r.read_fourcc()?;
    let large = size32 == 1;
    let size = if large { r.read_uint64()? } else { size32 as u64 };

    let uuid = if typ == FourCC::UUID { Some(r.read_array::<16>()?) } else { None };

    let header_size = match (large, uuid.is_some()) {
        (true, true) => 8 + 8 + 16,
        (true, false) => 8 + 8,
        (false, true) => 8 + 16,
        (false, false) => 8,
    };

    if size != 0 && size < header_size {
        return Err(Error::InvalidSize { offset: start, size });
    }

    Ok(BoxHeader { size, typ, uuid, header_size, start, large })
}

/// Recursive-descent box parser over a shared byte source.
pub struct Parser<'a> {
    registry: &'a Registry,
    options: ParseOptions,
}

impl<'a> Parser<'a> {
    pub fn new(registry: &'a Registry, options: ParseOptions) -> Self {
        Self { registry, options }
    }

    /// Parse root boxes until the source is exhausted.
    pub fn parse_roots(&self, source: Rc<dyn ByteSource>) -> Result<BoxTree> {
        let end = source.len();
        let mut r = SourceReader::new(source, 0);
        let mut tree = BoxTree::new();
        while r.position() < end {
            let budget = end - r.position();
            let (id, consumed) = self.parse_box(&mut tree, &mut r, None, budget)?;
            debug!(
                typ = %tree.node(id).typ,
                offset = r.position() - consumed,
                size = consumed,
                "parsed root box"
            );
        }
        Ok(tree)
    }

    /// Parse the children of `parent` from `budget` bytes at the reader's
    /// position. The budget must be consumed exactly.
    pub fn parse_children(
        &self,
        tree: &mut BoxTree,
        r: &mut SourceReader,
        parent: NodeId,
        budget: u64,
    ) -> Result<()> {
        let start = r.position();
        let mut remaining = budget;
        while remaining >= MIN_HEADER {
            let (_, consumed) = self.parse_box(tree, r, Some(parent), remaining)?;
            remaining -= consumed;
        }
        if remaining != 0 {
            return Err(Error::StructuralMismatch {
                offset: start,
                declared: budget,
                consumed: budget - remaining,
            });
        }
        Ok(())
    }

    /// Parse one box whose end may not pass `budget` bytes from the reader's
    /// position. Returns the new node and the bytes it occupied.
    pub fn parse_box(
        &self,
        tree: &mut BoxTree,
        r: &mut SourceReader,
        parent: Option<NodeId>,
        budget: u64,
    ) -> Result<(NodeId, u64)> {
        let hdr = read_box_header(r)?;
        self.parse_content(tree, r, parent, budget, &hdr)
            .map_err(|e| e.within(hdr.typ, hdr.start))
    }

    fn parse_content(
        &self,
        tree: &mut BoxTree,
        r: &mut SourceReader,
        parent: Option<NodeId>,
        budget: u64,
        hdr: &BoxHeader,
    ) -> Result<(NodeId, u64)> {
        let size = match hdr.size {
            0 if parent.is_some() => return Err(Error::ZeroSizeNotAtRoot { offset: hdr.start }),
            0 => budget,
            n => n,
        };
        if hdr.header_size > size {
            return Err(Error::InvalidSize { offset: hdr.start, size });
        }
        if size > budget {
            // Past the end of the source the file is cut short; inside a
            // parent the sizes disagree.
            return Err(match parent {
                None => Error::Truncated { needed: size - budget },
                Some(_) => {
                    Error::ChildOverrun { offset: hdr.start, remaining: budget, child_size: size }
                }
            });
        }
        let content = size - hdr.header_size;
        let key = BoxKey::new(hdr.typ, hdr.uuid);
        let kind = self.registry.kind_of(&key);
        trace!(typ = %hdr.typ, offset = hdr.start, size, ?kind, "box");

        let mut node = BoxNode::new(hdr.typ, BoxData::plain_container());
        node.uuid = hdr.uuid;
        node.offset = Some(hdr.start);
        node.large_size = hdr.large;

        let id = match kind {
            BoxKind::Container(prefix) => {
                let mut limited = Read::take(&mut *r, content);
                let prefix = read_prefix(&mut limited, prefix)?;
                let prefix_size = prefix.size();
                let declared_entries = match &prefix {
                    ContainerPrefix::Counted { .. } => Some(limited.read_uint32()?),
                    _ => None,
                };
                node.data = BoxData::container(prefix);
                let id = tree.add_node(parent, node)?;
                self.parse_children(tree, r, id, content - prefix_size)?;
                if let Some(n) = declared_entries {
                    let found = tree.children(id).len();
                    if n as usize != found {
                        warn!(typ = %hdr.typ, declared = n, found, "entry count disagrees with children");
                    }
                }
                id
            }
            BoxKind::Leaf(parse) => {
                let bytes = r.take(content)?;
                let mut c = Cursor::new(&bytes[..]);
                match parse(&mut c) {
                    Ok(data) => {
                        let used = c.position() as usize;
                        if remaining(&c) > 0 {
                            trace!(typ = %hdr.typ, trailing = remaining(&c), "trailing bytes kept");
                        }
                        node.trailing = bytes.slice(used..);
                        node.data = data;
                    }
                    Err(Error::InvalidUtf8) => {
                        warn!(typ = %hdr.typ, offset = hdr.start, "invalid utf-8, keeping box opaque");
                        node.data = BoxData::raw(bytes);
                    }
                    Err(e) => return Err(e),
                }
                tree.add_node(parent, node)?
            }
            BoxKind::MediaData => {
                let range = r.take_range(content)?;
                node.data = BoxData::MediaData(MediaDataBox::from_payload(Payload::Range(range)));
                tree.add_node(parent, node)?
            }
            BoxKind::Opaque => {
                let payload = if content > self.options.lazy_threshold {
                    Payload::Range(r.take_range(content)?)
                } else {
                    Payload::Memory(r.take(content)?)
                };
                node.data = BoxData::Raw(crate::boxes::RawBox { payload });
                tree.add_node(parent, node)?
            }
        };

        r.seek_to(hdr.start + size);
        Ok((id, size))
    }
}

fn read_prefix<R: Read>(r: &mut R, kind: PrefixKind) -> Result<ContainerPrefix> {
    Ok(match kind {
        PrefixKind::Plain => ContainerPrefix::Plain,
        PrefixKind::Full => {
            let (version, flags) = r.read_full_header()?;
            ContainerPrefix::Full { version, flags }
        }
        PrefixKind::Counted => {
            let (version, flags) = r.read_full_header()?;
            ContainerPrefix::Counted { version, flags }
        }
        PrefixKind::Visual => ContainerPrefix::Visual(VisualSampleEntry::parse(r)?),
        PrefixKind::Audio => ContainerPrefix::Audio(AudioSampleEntry::parse(r)?),
        PrefixKind::Hint => ContainerPrefix::Hint(HintSampleEntry::parse(r)?),
    })
}

/// Parse a standalone buffer of boxes, e.g. a `moov` captured elsewhere.
pub fn parse_bytes(bytes: Bytes, registry: &Registry) -> Result<BoxTree> {
    Parser::new(registry, ParseOptions::default()).parse_roots(Rc::new(bytes))
}
