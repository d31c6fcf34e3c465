//! The track producer interface consumed by the multiplexer.

use crate::boxes::{BoxData, BoxTree, ContainerPrefix, FourCC};
use crate::error::{Error, Result};
use crate::movie_boxes::{TRACK_ENABLED, TRACK_IN_MOVIE, TRACK_IN_POSTER, TRACK_IN_PREVIEW};
use crate::sample_table::{CompositionOffsetEntry, SampleDependency, TimeToSampleEntry};
use crate::source::Payload;
use serde::Serialize;

/// Closed set of media kinds the builder knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    Video,
    Sound,
    Hint,
    Text,
    Data,
    Unknown(FourCC),
}

impl MediaKind {
    pub fn from_handler(handler: FourCC) -> Self {
        match &handler.0 {
            b"vide" => MediaKind::Video,
            b"soun" => MediaKind::Sound,
            b"hint" => MediaKind::Hint,
            b"text" => MediaKind::Text,
            b"data" => MediaKind::Data,
            _ => MediaKind::Unknown(handler),
        }
    }

    pub fn handler_type(&self) -> Result<FourCC> {
        Ok(FourCC(match self {
            MediaKind::Video => *b"vide",
            MediaKind::Sound => *b"soun",
            MediaKind::Hint => *b"hint",
            MediaKind::Text => *b"text",
            MediaKind::Data => *b"data",
            MediaKind::Unknown(cc) => return Err(Error::UnsupportedMediaKind(*cc)),
        }))
    }

    pub fn handler_name(&self) -> &'static str {
        match self {
            MediaKind::Video => "VideoHandler",
            MediaKind::Sound => "SoundHandler",
            MediaKind::Hint => "HintHandler",
            MediaKind::Text => "TextHandler",
            MediaKind::Data => "DataHandler",
            MediaKind::Unknown(_) => "",
        }
    }
}

/// Identity and presentation fields of a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMeta {
    pub track_id: u32,
    pub timescale: u32,
    pub language: String,
    /// Seconds since 1904-01-01; 0 means "use the build time".
    pub creation_time: u64,
    pub modification_time: u64,
    pub width: f64,
    pub height: f64,
    pub volume: f32,
    pub layer: i16,
    pub alternate_group: i16,
    /// Presentation delay in seconds, written as an empty edit.
    pub start_time: f64,
    /// `tkhd` flag bits.
    pub flags: u32,
}

impl Default for TrackMeta {
    fn default() -> Self {
        Self {
            track_id: 1,
            timescale: 1000,
            language: "und".to_string(),
            creation_time: 0,
            modification_time: 0,
            width: 0.0,
            height: 0.0,
            volume: 0.0,
            layer: 0,
            alternate_group: 0,
            start_time: 0.0,
            flags: TRACK_ENABLED | TRACK_IN_MOVIE | TRACK_IN_PREVIEW,
        }
    }
}

/// Anything that can feed samples and their tables into the multiplexer.
///
/// All sample numbers are 1-based. `sync_samples` returns `None` when every
/// sample is a sync sample.
pub trait Track {
    fn meta(&self) -> &TrackMeta;
    fn kind(&self) -> MediaKind;
    fn samples(&self) -> &[Payload];
    fn decoding_time_entries(&self) -> &[TimeToSampleEntry];

    fn composition_time_entries(&self) -> &[CompositionOffsetEntry] {
        &[]
    }

    fn sync_samples(&self) -> Option<&[u32]> {
        None
    }

    fn sample_dependencies(&self) -> &[SampleDependency] {
        &[]
    }

    /// A tree whose single root is the `stsd` box.
    fn sample_description(&self) -> &BoxTree;

    fn is_enabled(&self) -> bool {
        self.meta().flags & TRACK_ENABLED != 0
    }

    fn is_in_movie(&self) -> bool {
        self.meta().flags & TRACK_IN_MOVIE != 0
    }

    fn is_in_preview(&self) -> bool {
        self.meta().flags & TRACK_IN_PREVIEW != 0
    }

    fn is_in_poster(&self) -> bool {
        self.meta().flags & TRACK_IN_POSTER != 0
    }
}

/// Sum of all decoding deltas, in the track's timescale.
pub fn track_duration(track: &dyn Track) -> u64 {
    track
        .decoding_time_entries()
        .iter()
        .map(|e| e.count as u64 * e.delta as u64)
        .sum()
}

/// Checks the decoding-time entries cover exactly the samples.
pub fn validate_track(track: &dyn Track) -> Result<()> {
    let id = track.meta().track_id;
    let samples = track.samples().len() as u64;
    if samples == 0 {
        return Err(Error::EmptyTrack { track_id: id });
    }
    if track.meta().timescale == 0 {
        return Err(Error::InconsistentTrack { track_id: id, reason: "timescale is 0".into() });
    }
    let counted: u64 = track.decoding_time_entries().iter().map(|e| e.count as u64).sum();
    if counted != samples {
        return Err(Error::InconsistentTrack {
            track_id: id,
            reason: format!("decoding time entries cover {counted} samples, track has {samples}"),
        });
    }
    if track.sample_description().root_of_type(b"stsd").is_none() {
        return Err(Error::MissingBox("stsd"));
    }
    Ok(())
}

/// An `stsd` tree holding one sample entry of type `entry` with the given
/// fixed fields. Codec configuration boxes can be added under the returned
/// tree's entry node.
pub fn single_entry_stsd(entry: FourCC, prefix: ContainerPrefix) -> Result<BoxTree> {
    let mut tree = BoxTree::new();
    let stsd = tree.add_root(
        *b"stsd",
        BoxData::container(ContainerPrefix::Counted { version: 0, flags: 0 }),
    );
    tree.add_child(stsd, entry, BoxData::container(prefix))?;
    Ok(tree)
}

/// `Track` for a struct holding the tables in fields named `meta`, `kind`,
/// `samples`, `decoding`, `composition`, `sync`, `dependencies` and
/// `description`.
macro_rules! owned_track {
    ($ty:ty) => {
        impl $crate::track::Track for $ty {
            fn meta(&self) -> &$crate::track::TrackMeta {
                &self.meta
            }

            fn kind(&self) -> $crate::track::MediaKind {
                self.kind
            }

            fn samples(&self) -> &[$crate::source::Payload] {
                &self.samples
            }

            fn decoding_time_entries(&self) -> &[$crate::sample_table::TimeToSampleEntry] {
                &self.decoding
            }

            fn composition_time_entries(&self) -> &[$crate::sample_table::CompositionOffsetEntry] {
                &self.composition
            }

            fn sync_samples(&self) -> Option<&[u32]> {
                self.sync.as_deref()
            }

            fn sample_dependencies(&self) -> &[$crate::sample_table::SampleDependency] {
                &self.dependencies
            }

            fn sample_description(&self) -> &$crate::boxes::BoxTree {
                &self.description
            }
        }
    };
}

pub(crate) use owned_track;

/// A track assembled in memory, sample by sample.
#[derive(Debug, Clone)]
pub struct MemoryTrack {
    meta: TrackMeta,
    kind: MediaKind,
    samples: Vec<Payload>,
    decoding: Vec<TimeToSampleEntry>,
    composition: Vec<CompositionOffsetEntry>,
    sync: Vec<u32>,
    all_sync: bool,
    dependencies: Vec<SampleDependency>,
    description: BoxTree,
}

impl MemoryTrack {
    pub fn new(kind: MediaKind, meta: TrackMeta, sample_description: BoxTree) -> Self {
        Self {
            meta,
            kind,
            samples: Vec::new(),
            decoding: Vec::new(),
            composition: Vec::new(),
            sync: Vec::new(),
            all_sync: true,
            dependencies: Vec::new(),
            description: sample_description,
        }
    }

    /// Append one sample lasting `duration` ticks.
    pub fn push_sample(&mut self, data: impl Into<Payload>, duration: u32, sync: bool) {
        self.samples.push(data.into());
        match self.decoding.last_mut() {
            Some(e) if e.delta == duration => e.count += 1,
            _ => self.decoding.push(TimeToSampleEntry { count: 1, delta: duration }),
        }
        if sync {
            self.sync.push(self.samples.len() as u32);
        } else {
            self.all_sync = false;
        }
    }

    /// Replace the sync table; `None` marks every sample as sync.
    pub fn with_sync_samples(mut self, sync: Option<Vec<u32>>) -> Self {
        match sync {
            Some(s) => {
                self.sync = s;
                self.all_sync = false;
            }
            None => {
                self.sync = (1..=self.samples.len() as u32).collect();
                self.all_sync = true;
            }
        }
        self
    }

    pub fn with_composition_offsets(mut self, entries: Vec<CompositionOffsetEntry>) -> Self {
        self.composition = entries;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<SampleDependency>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn meta_mut(&mut self) -> &mut TrackMeta {
        &mut self.meta
    }
}

impl Track for MemoryTrack {
    fn meta(&self) -> &TrackMeta {
        &self.meta
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn samples(&self) -> &[Payload] {
        &self.samples
    }

    fn decoding_time_entries(&self) -> &[TimeToSampleEntry] {
        &self.decoding
    }

    fn composition_time_entries(&self) -> &[CompositionOffsetEntry] {
        &self.composition
    }

    fn sync_samples(&self) -> Option<&[u32]> {
        if self.all_sync { None } else { Some(&self.sync) }
    }

    fn sample_dependencies(&self) -> &[SampleDependency] {
        &self.dependencies
    }

    fn sample_description(&self) -> &BoxTree {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_table::VisualSampleEntry;

    fn video() -> MemoryTrack {
        let stsd = single_entry_stsd(
            FourCC(*b"avc1"),
            ContainerPrefix::Visual(VisualSampleEntry::new(320, 240)),
        ).unwrap();
        MemoryTrack::new(MediaKind::Video, TrackMeta::default(), stsd)
    }

    #[test]
    fn push_sample_run_length_encodes_durations() {
        let mut t = video();
        t.push_sample(vec![1u8; 4], 40, true);
        t.push_sample(vec![2u8; 4], 40, false);
        t.push_sample(vec![3u8; 4], 20, false);
        assert_eq!(
            t.decoding_time_entries(),
            &[TimeToSampleEntry { count: 2, delta: 40 }, TimeToSampleEntry { count: 1, delta: 20 }]
        );
        assert_eq!(t.sync_samples(), Some(&[1u32][..]));
        assert_eq!(track_duration(&t), 100);
        validate_track(&t).unwrap();
    }

    #[test]
    fn all_sync_reports_none() {
        let mut t = video();
        t.push_sample(vec![0u8], 1, true);
        t.push_sample(vec![0u8], 1, true);
        assert!(t.sync_samples().is_none());
    }

    #[test]
    fn unknown_handler_has_no_handler_type() {
        let kind = MediaKind::from_handler(FourCC(*b"meta"));
        assert!(matches!(kind.handler_type(), Err(Error::UnsupportedMediaKind(_))));
        assert_eq!(MediaKind::from_handler(FourCC(*b"soun")), MediaKind::Sound);
    }

    #[test]
    fn empty_track_is_rejected() {
        let t = video();
        assert!(matches!(validate_track(&t), Err(Error::EmptyTrack { track_id: 1 })));
    }
}
