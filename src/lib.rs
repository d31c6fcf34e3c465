//! ISO base media file format (MP4) box trees and a progressive muxer.
//!
//! Parse a file into a [`BoxTree`] with [`IsoFile`], edit or inspect it, and
//! write it back byte for byte. Read its tracks with [`MovieCreator`],
//! derive new ones with [`CroppedTrack`] / [`AppendTrack`], and interleave
//! them into a new file with [`Mp4Builder`].

pub mod boxes;
pub mod builder;
pub mod cursor;
pub mod error;
pub mod fragment;
pub mod iso_file;
pub mod json_api;
pub mod known_boxes;
pub mod mdat;
pub mod movie;
pub mod movie_boxes;
pub mod parser;
pub mod registry;
pub mod sample_table;
pub mod source;
pub mod track;
pub mod tracks;
pub mod util;

pub use boxes::{BoxContent, BoxData, BoxHeader, BoxKey, BoxNode, BoxTree, FourCC, NodeId};
pub use builder::{BuildOptions, Mp4Builder};
pub use error::{Error, Result};
pub use iso_file::IsoFile;
pub use json_api::{HexDump, JsonBox, analyze_file, hex_range};
pub use movie::{Movie, MovieCreator, Mp4Track};
pub use parser::{ParseOptions, Parser, read_box_header};
pub use registry::{BoxKind, PrefixKind, Registry, default_registry};
pub use source::{ByteSource, Payload, ReaderSource, SourceRange};
pub use track::{MediaKind, MemoryTrack, Track, TrackMeta};
pub use tracks::{AppendTrack, ChangeTimeScaleTrack, CroppedTrack};

/// A sample is a run of bytes, in memory or in a source.
pub type Sample = Payload;
