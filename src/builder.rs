//! Multiplexes a [`Movie`] into a progressive file: `ftyp`, `moov`, `mdat`.
//!
//! Chunking follows the first track that carries a non-empty sync table:
//! every track is cut into the same number of chunks, with boundaries
//! stretched from the reference track's sync samples by the ratio of sample
//! counts. Chunk `i` of every track is written before chunk `i + 1` of any
//! track, in movie track order.

use crate::boxes::{BoxData, BoxTree, ContainerPrefix, FourCC, NodeId};
use crate::error::{Error, Result};
use crate::mdat::MediaDataBox;
use crate::movie::Movie;
use crate::movie_boxes::{
    DataEntryUrlBox, EditListBox, EditListEntry, FileTypeBox, HandlerBox, HintMediaHeaderBox,
    MediaHeaderBox, MovieHeaderBox, NullMediaHeaderBox, SoundMediaHeaderBox, TrackHeaderBox,
    UNITY_MATRIX, VideoMediaHeaderBox,
};
use crate::sample_table::{
    ChunkOffsetBox, CompositionTimeToSampleBox, SampleDependencyTypeBox, SampleSizeBox,
    SampleToChunkBox, SampleToChunkEntry, SyncSampleBox, TimeToSampleBox,
};
use crate::source::Payload;
use crate::track::{MediaKind, Track, track_duration, validate_track};
use crate::util::{gcd, now_since_1904, rescale};
use bytes::BytesMut;
use tracing::{debug, info, trace};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
    /// Seconds since 1904; `None` uses the wall clock.
    pub creation_time: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            major_brand: FourCC(*b"isom"),
            minor_version: 0,
            compatible_brands: vec![FourCC(*b"isom"), FourCC(*b"iso2"), FourCC(*b"avc1")],
            creation_time: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mp4Builder {
    options: BuildOptions,
}

impl Mp4Builder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Build the box tree of a complete file. Chunk offsets already point at
    /// the sample bytes as they will sit in the serialized output.
    pub fn build(&self, movie: &Movie) -> Result<BoxTree> {
        if movie.is_empty() {
            return Err(Error::EmptyMovie);
        }
        for track in movie.tracks() {
            validate_track(track.as_ref())?;
            track.kind().handler_type()?;
        }

        let creation_time = self.options.creation_time.unwrap_or_else(now_since_1904);
        let timescale = movie_timescale(movie);
        let duration = movie_duration(movie, timescale);
        info!(tracks = movie.len(), timescale, duration, "building movie");

        let chunks = plan_chunks(movie)?;
        let layout = interleave(movie, &chunks);

        let mut tree = BoxTree::new();
        tree.add_root(
            *b"ftyp",
            BoxData::FileType(FileTypeBox {
                major_brand: self.options.major_brand,
                minor_version: self.options.minor_version,
                compatible_brands: self.options.compatible_brands.clone(),
            }),
        );
        let moov = tree.add_root(*b"moov", BoxData::plain_container());
        tree.add_child(
            moov,
            *b"mvhd",
            BoxData::MovieHeader(MovieHeaderBox::new(
                creation_time,
                timescale,
                duration,
                next_track_id(movie),
            )),
        )?;

        let mut offset_boxes = Vec::with_capacity(movie.len());
        for (track, sizes) in movie.tracks().iter().zip(&chunks) {
            let ctx = TrakContext { movie_timescale: timescale, creation_time };
            offset_boxes.push(add_trak(&mut tree, moov, track.as_ref(), sizes, &ctx)?);
        }

        let mdat = tree.add_root(*b"mdat", BoxData::MediaData(MediaDataBox::interleaved(layout.runs)));
        resolve_chunk_offsets(&mut tree, mdat, &offset_boxes, &layout.chunk_offsets)?;
        Ok(tree)
    }
}

/// Greatest common divisor of the track timescales.
pub fn movie_timescale(movie: &Movie) -> u32 {
    let ts = movie
        .tracks()
        .iter()
        .fold(0u64, |acc, t| gcd(acc, t.meta().timescale as u64));
    ts.max(1) as u32
}

/// Longest track duration in the movie timescale.
pub fn movie_duration(movie: &Movie, movie_timescale: u32) -> u64 {
    movie
        .tracks()
        .iter()
        .map(|t| rescale(track_duration(t.as_ref()), t.meta().timescale, movie_timescale))
        .max()
        .unwrap_or(0)
}

pub fn next_track_id(movie: &Movie) -> u32 {
    movie.tracks().iter().map(|t| t.meta().track_id).max().unwrap_or(0).saturating_add(1)
}

/// The reference track's index, its sample count and the 1-based first
/// sample of each of its chunks.
///
/// Without any sync table the first track is cut into one chunk per two
/// seconds of its duration.
pub fn reference_chunk_starts(movie: &Movie) -> Result<(usize, u64, Vec<u64>)> {
    let tracks = movie.tracks();
    if tracks.is_empty() {
        return Err(Error::EmptyMovie);
    }
    if let Some((i, sync)) = tracks
        .iter()
        .enumerate()
        .find_map(|(i, t)| t.sync_samples().filter(|s| !s.is_empty()).map(|s| (i, s)))
    {
        let count = tracks[i].samples().len() as u64;
        debug!(track_id = tracks[i].meta().track_id, chunks = sync.len(), "chunking on sync samples");
        return Ok((i, count, sync.iter().map(|&s| s as u64).collect()));
    }

    let first = tracks[0].as_ref();
    let count = first.samples().len() as u64;
    if count == 0 {
        return Err(Error::EmptyTrack { track_id: first.meta().track_id });
    }
    let seconds = track_duration(first) / first.meta().timescale.max(1) as u64;
    let chunk_count = (seconds / 2).clamp(1, count);
    let step = count / chunk_count;
    debug!(track_id = first.meta().track_id, chunks = chunk_count, "chunking on duration");
    Ok((0, count, (0..chunk_count).map(|i| 1 + i * step).collect()))
}

/// Chunk sizes for a track of `sample_count` samples given the reference
/// track's `reference_count` and chunk starts. Sizes may come out negative
/// for malformed starts; see [`checked_chunk_sizes`].
pub fn chunk_sizes(sample_count: u64, reference_count: u64, starts: &[u64]) -> Vec<i64> {
    if starts.is_empty() || reference_count == 0 {
        return vec![sample_count as i64];
    }
    let stretch = sample_count as f64 / reference_count as f64;
    let mut bounds = Vec::with_capacity(starts.len() + 1);
    bounds.push(0i64);
    for &start in &starts[1..] {
        bounds.push((stretch * (start as f64 - 1.0)).round() as i64);
    }
    bounds.push(sample_count as i64);
    bounds.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn checked_chunk_sizes(
    track_id: u32,
    sample_count: u64,
    reference_count: u64,
    starts: &[u64],
) -> Result<Vec<u64>> {
    let sizes = chunk_sizes(sample_count, reference_count, starts);
    let sum: i64 = sizes.iter().sum();
    if sum != sample_count as i64 || sizes.iter().any(|&s| s < 0) {
        return Err(Error::ChunkingInconsistency {
            track_id,
            expected: sample_count,
            actual: sizes.iter().map(|&s| s.max(0)).sum(),
        });
    }
    Ok(sizes.into_iter().map(|s| s as u64).collect())
}

/// Samples per chunk, in chunks, for every track of the movie.
pub fn plan_chunks(movie: &Movie) -> Result<Vec<Vec<u64>>> {
    let (_, reference_count, starts) = reference_chunk_starts(movie)?;
    movie
        .tracks()
        .iter()
        .map(|t| {
            checked_chunk_sizes(
                t.meta().track_id,
                t.samples().len() as u64,
                reference_count,
                &starts,
            )
        })
        .collect()
}

/// Run-length `stsc` entries. Empty chunks are skipped and do not take a
/// chunk number.
pub fn sample_to_chunk_entries(chunk_sizes: &[u64]) -> Vec<SampleToChunkEntry> {
    let mut entries: Vec<SampleToChunkEntry> = Vec::new();
    for (i, &n) in chunk_sizes.iter().filter(|&&n| n > 0).enumerate() {
        if entries.last().is_some_and(|e| e.samples_per_chunk as u64 == n) {
            continue;
        }
        entries.push(SampleToChunkEntry {
            first_chunk: i as u32 + 1,
            samples_per_chunk: n as u32,
            sample_description_index: 1,
        });
    }
    entries
}

/// The `mdat` content and every track's chunk offsets relative to it.
struct Layout {
    runs: Vec<Payload>,
    chunk_offsets: Vec<Vec<u64>>,
}

/// Accumulates payloads, merging in-memory neighbours into one buffer and
/// contiguous ranges of one source into one range.
#[derive(Default)]
struct RunBuilder {
    runs: Vec<Payload>,
    pending: BytesMut,
}

impl RunBuilder {
    fn push(&mut self, payload: &Payload) {
        match payload {
            Payload::Memory(b) => self.pending.extend_from_slice(b),
            Payload::Range(r) => {
                self.flush();
                if let Some(Payload::Range(last)) = self.runs.last_mut() {
                    if last.is_followed_by(r) {
                        last.len += r.len;
                        return;
                    }
                }
                self.runs.push(Payload::Range(r.clone()));
            }
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.runs.push(Payload::Memory(self.pending.split().freeze()));
        }
    }

    fn finish(mut self) -> Vec<Payload> {
        self.flush();
        self.runs
    }
}

fn interleave(movie: &Movie, chunks: &[Vec<u64>]) -> Layout {
    let tracks = movie.tracks();
    let chunk_count = chunks.iter().map(Vec::len).max().unwrap_or(0);
    let mut next_sample = vec![0usize; tracks.len()];
    let mut chunk_offsets = vec![Vec::new(); tracks.len()];
    let mut runs = RunBuilder::default();
    let mut position = 0u64;

    for chunk in 0..chunk_count {
        for (t, track) in tracks.iter().enumerate() {
            let n = chunks[t].get(chunk).copied().unwrap_or(0) as usize;
            if n == 0 {
                continue;
            }
            chunk_offsets[t].push(position);
            let first = next_sample[t];
            for sample in &track.samples()[first..first + n] {
                runs.push(sample);
                position += sample.len();
            }
            next_sample[t] += n;
            trace!(track_id = track.meta().track_id, chunk, samples = n, "chunk");
        }
    }
    let runs = runs.finish();
    debug!(bytes = position, runs = runs.len(), "interleaved media");
    Layout { runs, chunk_offsets }
}

struct TrakContext {
    movie_timescale: u32,
    creation_time: u64,
}

fn media_header(kind: MediaKind) -> Result<(FourCC, BoxData)> {
    Ok(match kind {
        MediaKind::Video => (FourCC(*b"vmhd"), BoxData::VideoMediaHeader(VideoMediaHeaderBox::default())),
        MediaKind::Sound => (FourCC(*b"smhd"), BoxData::SoundMediaHeader(SoundMediaHeaderBox::default())),
        MediaKind::Hint => (FourCC(*b"hmhd"), BoxData::HintMediaHeader(HintMediaHeaderBox::default())),
        MediaKind::Text | MediaKind::Data => {
            (FourCC(*b"nmhd"), BoxData::NullMediaHeader(NullMediaHeaderBox::default()))
        }
        MediaKind::Unknown(cc) => return Err(Error::UnsupportedMediaKind(cc)),
    })
}

/// Append one `trak`; returns its chunk offset box, still holding
/// placeholder offsets.
fn add_trak(
    tree: &mut BoxTree,
    moov: NodeId,
    track: &dyn Track,
    chunk_sizes: &[u64],
    ctx: &TrakContext,
) -> Result<NodeId> {
    let meta = track.meta();
    let kind = track.kind();
    let media_duration = track_duration(track);
    let creation_time = if meta.creation_time == 0 { ctx.creation_time } else { meta.creation_time };
    let modification_time =
        if meta.modification_time == 0 { creation_time } else { meta.modification_time };
    let trak = tree.add_child(moov, *b"trak", BoxData::plain_container())?;

    let mut tkhd = TrackHeaderBox {
        version: 0,
        flags: meta.flags,
        creation_time,
        modification_time,
        track_id: meta.track_id,
        reserved: (0, [0; 8], 0),
        duration: rescale(media_duration, meta.timescale, ctx.movie_timescale),
        layer: meta.layer,
        alternate_group: meta.alternate_group,
        volume: meta.volume,
        matrix: UNITY_MATRIX,
        width: meta.width,
        height: meta.height,
    };
    tkhd.pick_version();
    let track_movie_duration = tkhd.duration;
    tree.add_child(trak, *b"tkhd", BoxData::TrackHeader(tkhd))?;

    if meta.start_time > 0.0 {
        let delay = (meta.start_time * ctx.movie_timescale as f64).round() as u64;
        let edts = tree.add_child(trak, *b"edts", BoxData::plain_container())?;
        tree.add_child(
            edts,
            *b"elst",
            BoxData::EditList(EditListBox::new(vec![
                EditListEntry::empty(delay),
                EditListEntry::media(track_movie_duration, 0),
            ])),
        )?;
    }

    let mdia = tree.add_child(trak, *b"mdia", BoxData::plain_container())?;
    let mdhd = MediaHeaderBox::new(creation_time, meta.timescale, media_duration, &meta.language);
    tree.add_child(mdia, *b"mdhd", BoxData::MediaHeader(mdhd))?;
    tree.add_child(
        mdia,
        *b"hdlr",
        BoxData::Handler(HandlerBox::new(kind.handler_type()?, kind.handler_name())),
    )?;

    let minf = tree.add_child(mdia, *b"minf", BoxData::plain_container())?;
    let (header_type, header) = media_header(kind)?;
    tree.add_child(minf, header_type, header)?;
    let dinf = tree.add_child(minf, *b"dinf", BoxData::plain_container())?;
    let dref = tree.add_child(
        dinf,
        *b"dref",
        BoxData::container(ContainerPrefix::Counted { version: 0, flags: 0 }),
    )?;
    tree.add_child(dref, *b"url ", BoxData::DataEntryUrl(DataEntryUrlBox::self_contained()))?;

    let stbl = tree.add_child(minf, *b"stbl", BoxData::plain_container())?;
    let description = track.sample_description();
    let stsd = description.root_of_type(b"stsd").ok_or(Error::MissingBox("stsd"))?;
    tree.graft(Some(stbl), description, stsd)?;

    let decoding = track.decoding_time_entries();
    if !decoding.is_empty() {
        tree.add_child(
            stbl,
            *b"stts",
            BoxData::TimeToSample(TimeToSampleBox { version: 0, flags: 0, entries: decoding.to_vec() }),
        )?;
    }
    let composition = track.composition_time_entries();
    if !composition.is_empty() {
        tree.add_child(
            stbl,
            *b"ctts",
            BoxData::CompositionTimeToSample(CompositionTimeToSampleBox::new(composition.to_vec())),
        )?;
    }
    if let Some(sync) = track.sync_samples() {
        tree.add_child(
            stbl,
            *b"stss",
            BoxData::SyncSample(SyncSampleBox { version: 0, flags: 0, sample_numbers: sync.to_vec() }),
        )?;
    }
    let dependencies = track.sample_dependencies();
    if !dependencies.is_empty() {
        tree.add_child(
            stbl,
            *b"sdtp",
            BoxData::SampleDependencyType(SampleDependencyTypeBox {
                version: 0,
                flags: 0,
                entries: dependencies.to_vec(),
            }),
        )?;
    }
    tree.add_child(
        stbl,
        *b"stsc",
        BoxData::SampleToChunk(SampleToChunkBox {
            version: 0,
            flags: 0,
            entries: sample_to_chunk_entries(chunk_sizes),
        }),
    )?;
    let sizes = track.samples().iter().map(|s| s.len() as u32).collect();
    tree.add_child(stbl, *b"stsz", BoxData::SampleSize(SampleSizeBox::from_sizes(sizes)))?;

    let non_empty = chunk_sizes.iter().filter(|&&n| n > 0).count();
    let stco = tree.add_child(
        stbl,
        *b"stco",
        BoxData::ChunkOffset(ChunkOffsetBox::new(vec![0; non_empty], false)),
    )?;
    info!(track_id = meta.track_id, ?kind, chunks = non_empty, "added trak");
    Ok(stco)
}

/// Rewrite placeholder chunk offsets to absolute file offsets. When any
/// offset passes 32 bits every table becomes `co64`, which moves `mdat`,
/// so the offsets are resolved once more.
fn resolve_chunk_offsets(
    tree: &mut BoxTree,
    mdat: NodeId,
    offset_boxes: &[NodeId],
    relative: &[Vec<u64>],
) -> Result<()> {
    let mut large = false;
    for _ in 0..2 {
        let base = tree.offset_of(mdat) + tree.header_size(mdat);
        let mut overflow = false;
        for (&id, rel) in offset_boxes.iter().zip(relative) {
            let node = tree.node_mut(id);
            match &mut node.data {
                BoxData::ChunkOffset(b) => {
                    b.large = large;
                    b.offsets = rel.iter().map(|&r| r + base).collect();
                    overflow |= !b.fits_u32();
                    node.typ = FourCC(b.fourcc());
                }
                _ => return Err(Error::tree("chunk offset node replaced during build")),
            }
        }
        if overflow && !large {
            info!(base, "chunk offsets exceed 32 bits, switching to co64");
            large = true;
            continue;
        }
        debug!(base, large, "resolved chunk offsets");
        return Ok(());
    }
    Ok(())
}
