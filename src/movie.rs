//! Movies as lists of tracks, and reading them back out of parsed files.

use crate::boxes::{BoxData, BoxTree, NodeId};
use crate::error::{Error, Result};
use crate::iso_file::IsoFile;
use crate::sample_table::{
    ChunkOffsetBox, CompositionOffsetEntry, SampleDependency, SampleSizeBox, SampleToChunkBox,
    TimeToSampleEntry,
};
use crate::source::{ByteSource, Payload, SourceRange};
use crate::track::{MediaKind, Track, TrackMeta, owned_track};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

/// An ordered list of tracks to be multiplexed.
#[derive(Default)]
pub struct Movie {
    tracks: Vec<Box<dyn Track>>,
}

impl Movie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_track(&mut self, track: impl Track + 'static) {
        self.tracks.push(Box::new(track));
    }

    pub fn add_boxed_track(&mut self, track: Box<dyn Track>) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[Box<dyn Track>] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Box<dyn Track>> {
        self.tracks
    }

    pub fn track_by_id(&self, id: u32) -> Option<&dyn Track> {
        self.tracks.iter().find(|t| t.meta().track_id == id).map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Reads every `trak` of a parsed file into a [`Movie`].
pub struct MovieCreator;

impl MovieCreator {
    pub fn build(file: &IsoFile) -> Result<Movie> {
        let tree = file.boxes();
        let moov = file.movie_box().ok_or(Error::MissingBox("moov"))?;
        let mut movie = Movie::new();
        for trak in tree.children_of_type(moov, b"trak") {
            let track = Mp4Track::from_trak(tree, trak, file.source())?;
            movie.add_track(track);
        }
        info!(tracks = movie.len(), "read movie");
        Ok(movie)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Movie> {
        Self::build(&IsoFile::open(path)?)
    }
}

/// A track whose samples are lazy ranges into a parsed file.
#[derive(Debug, Clone)]
pub struct Mp4Track {
    meta: TrackMeta,
    kind: MediaKind,
    samples: Vec<Payload>,
    decoding: Vec<TimeToSampleEntry>,
    composition: Vec<CompositionOffsetEntry>,
    sync: Option<Vec<u32>>,
    dependencies: Vec<SampleDependency>,
    description: BoxTree,
}

fn child(tree: &BoxTree, parent: NodeId, path: &'static str) -> Result<NodeId> {
    tree.find_path(Some(parent), path).ok_or(Error::MissingBox(path))
}

impl Mp4Track {
    pub fn from_trak(tree: &BoxTree, trak: NodeId, source: &Rc<dyn ByteSource>) -> Result<Self> {
        let tkhd = match &tree.node(child(tree, trak, "tkhd")?).data {
            BoxData::TrackHeader(b) => b.clone(),
            _ => return Err(Error::MissingBox("tkhd")),
        };
        let track_id = tkhd.track_id;
        let bad = |reason: String| Error::InconsistentTrack { track_id, reason };

        let mdhd = match &tree.node(child(tree, trak, "mdia/mdhd")?).data {
            BoxData::MediaHeader(b) => b.clone(),
            _ => return Err(Error::MissingBox("mdhd")),
        };
        let kind = match &tree.node(child(tree, trak, "mdia/hdlr")?).data {
            BoxData::Handler(h) => MediaKind::from_handler(h.handler_type),
            _ => return Err(Error::MissingBox("hdlr")),
        };
        let stbl = child(tree, trak, "mdia/minf/stbl")?;
        let description = tree.extract(child(tree, stbl, "stsd")?)?;

        let decoding = match &tree.node(child(tree, stbl, "stts")?).data {
            BoxData::TimeToSample(b) => b.entries.clone(),
            _ => return Err(Error::MissingBox("stts")),
        };
        let composition = match tree.child_of_type(stbl, b"ctts").map(|id| &tree.node(id).data) {
            Some(BoxData::CompositionTimeToSample(b)) => b.entries.clone(),
            _ => Vec::new(),
        };
        let sync = match tree.child_of_type(stbl, b"stss").map(|id| &tree.node(id).data) {
            Some(BoxData::SyncSample(b)) => Some(b.sample_numbers.clone()),
            _ => None,
        };
        let dependencies = match tree.child_of_type(stbl, b"sdtp").map(|id| &tree.node(id).data) {
            Some(BoxData::SampleDependencyType(b)) => b.entries.clone(),
            _ => Vec::new(),
        };

        let stsc = match &tree.node(child(tree, stbl, "stsc")?).data {
            BoxData::SampleToChunk(b) => b,
            _ => return Err(Error::MissingBox("stsc")),
        };
        let stsz = match &tree.node(child(tree, stbl, "stsz")?).data {
            BoxData::SampleSize(b) => b,
            _ => return Err(Error::MissingBox("stsz")),
        };
        let offsets_id = tree
            .child_of_type(stbl, b"stco")
            .or_else(|| tree.child_of_type(stbl, b"co64"))
            .ok_or(Error::MissingBox("stco"))?;
        let stco = match &tree.node(offsets_id).data {
            BoxData::ChunkOffset(b) => b,
            _ => return Err(Error::MissingBox("stco")),
        };
        let samples = sample_ranges(stsc, stsz, stco, source).map_err(bad)?;

        let start_time = empty_edit_seconds(tree, trak);
        let meta = TrackMeta {
            track_id,
            timescale: mdhd.timescale,
            language: mdhd.language.clone(),
            creation_time: mdhd.creation_time,
            modification_time: mdhd.modification_time,
            width: tkhd.width,
            height: tkhd.height,
            volume: tkhd.volume,
            layer: tkhd.layer,
            alternate_group: tkhd.alternate_group,
            start_time,
            flags: tkhd.flags,
        };
        debug!(track_id, ?kind, samples = samples.len(), "read track");
        Ok(Self { meta, kind, samples, decoding, composition, sync, dependencies, description })
    }
}

/// Lazy ranges for every sample, walking chunks in order.
fn sample_ranges(
    stsc: &SampleToChunkBox,
    stsz: &SampleSizeBox,
    stco: &ChunkOffsetBox,
    source: &Rc<dyn ByteSource>,
) -> std::result::Result<Vec<Payload>, String> {
    let per_chunk = stsc.expand(stco.offsets.len());
    let mut samples = Vec::with_capacity(stsz.sample_count as usize);
    let mut index = 0usize;
    for (&chunk_offset, &count) in stco.offsets.iter().zip(&per_chunk) {
        let mut offset = chunk_offset;
        for _ in 0..count {
            let size = stsz
                .size_of(index)
                .ok_or_else(|| format!("chunks reference sample {} past stsz", index + 1))?
                as u64;
            let end = match offset.checked_add(size) {
                Some(end) if end <= source.len() => end,
                _ => return Err(format!("sample {} at {offset} runs past the source", index + 1)),
            };
            samples.push(Payload::Range(SourceRange::new(Rc::clone(source), offset, size)));
            offset = end;
            index += 1;
        }
    }
    if index != stsz.sample_count as usize {
        return Err(format!("chunks hold {index} samples, stsz declares {}", stsz.sample_count));
    }
    Ok(samples)
}

/// Leading empty edit of `trak`, in seconds of the movie timescale.
fn empty_edit_seconds(tree: &BoxTree, trak: NodeId) -> f64 {
    let movie_timescale = tree
        .parent(trak)
        .and_then(|moov| tree.child_of_type(moov, b"mvhd"))
        .and_then(|id| match &tree.node(id).data {
            BoxData::MovieHeader(m) => Some(m.timescale),
            _ => None,
        });
    let first_edit = tree.find_path(Some(trak), "edts/elst").and_then(|id| match &tree.node(id).data {
        BoxData::EditList(e) => e.entries.first().copied(),
        _ => None,
    });
    match (movie_timescale, first_edit) {
        (Some(ts), Some(e)) if ts > 0 && e.media_time == -1 => e.segment_duration as f64 / ts as f64,
        _ => 0.0,
    }
}

owned_track!(Mp4Track);
