use crate::boxes::{BoxTree, NodeId};
use crate::error::Result;
use crate::parser::{ParseOptions, Parser};
use crate::registry::{Registry, default_registry};
use crate::source::{ByteSource, ReaderSource};
use bytes::Bytes;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

/// A parsed file: the root box list plus the source its lazy payloads
/// still read from.
///
/// The source must not change while this value (or any sample taken from
/// it) is alive.
pub struct IsoFile {
    tree: BoxTree,
    source: Rc<dyn ByteSource>,
}

impl IsoFile {
    pub fn parse(source: Rc<dyn ByteSource>) -> Result<Self> {
        Self::parse_with(source, &default_registry(), ParseOptions::default())
    }

    pub fn parse_with(
        source: Rc<dyn ByteSource>,
        registry: &Registry,
        options: ParseOptions,
    ) -> Result<Self> {
        let tree = Parser::new(registry, options).parse_roots(Rc::clone(&source))?;
        Ok(Self { tree, source })
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes: Bytes = bytes.into();
        Self::parse(Rc::new(bytes))
    }

    /// Parse a file on disk; `mdat` contents stay on disk until written.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(Rc::new(ReaderSource::open(path)?))
    }

    pub fn boxes(&self) -> &BoxTree {
        &self.tree
    }

    pub fn boxes_mut(&mut self) -> &mut BoxTree {
        &mut self.tree
    }

    pub fn into_boxes(self) -> BoxTree {
        self.tree
    }

    pub fn size(&self) -> u64 {
        self.tree.total_size()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<u64> {
        self.tree.write(w)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.tree.to_bytes()
    }

    pub fn movie_box(&self) -> Option<NodeId> {
        self.tree.root_of_type(b"moov")
    }

    pub fn source(&self) -> &Rc<dyn ByteSource> {
        &self.source
    }
}
