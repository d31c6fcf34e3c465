//! Tracks derived from other tracks: a sample window, a concatenation and a
//! change of timescale.

use crate::boxes::BoxTree;
use crate::error::{Error, Result};
use crate::sample_table::{CompositionOffsetEntry, SampleDependency, TimeToSampleEntry};
use crate::source::Payload;
use crate::track::{MediaKind, Track, TrackMeta, owned_track};
use crate::util::lcm;
use tracing::{debug, warn};

/// Samples `from..to` (0-based, end exclusive) of another track.
///
/// Tables are recomputed once at construction; the result owns cheap
/// clones of the sample payloads and does not borrow the source track.
#[derive(Debug, Clone)]
pub struct CroppedTrack {
    meta: TrackMeta,
    kind: MediaKind,
    samples: Vec<Payload>,
    decoding: Vec<TimeToSampleEntry>,
    composition: Vec<CompositionOffsetEntry>,
    sync: Option<Vec<u32>>,
    dependencies: Vec<SampleDependency>,
    description: BoxTree,
}

impl CroppedTrack {
    pub fn new(track: &dyn Track, from: usize, to: usize) -> Result<Self> {
        let total = track.samples().len();
        if from >= to || to > total {
            return Err(Error::InconsistentTrack {
                track_id: track.meta().track_id,
                reason: format!("crop window {from}..{to} outside 0..{total}"),
            });
        }
        let decoding = crop_runs(
            track.decoding_time_entries().iter().map(|e| (e.count, e.delta)),
            from,
            to,
        )
        .into_iter()
        .map(|(count, delta)| TimeToSampleEntry { count, delta })
        .collect();
        let composition = crop_runs(
            track.composition_time_entries().iter().map(|e| (e.count, e.offset)),
            from,
            to,
        )
        .into_iter()
        .map(|(count, offset)| CompositionOffsetEntry { count, offset })
        .collect();
        let sync = track.sync_samples().map(|s| {
            s.iter()
                .filter(|&&n| (n as usize) > from && (n as usize) <= to)
                .map(|&n| n - from as u32)
                .collect()
        });
        let deps = track.sample_dependencies();
        let dependencies = if deps.len() >= to { deps[from..to].to_vec() } else { Vec::new() };
        debug!(track_id = track.meta().track_id, from, to, "cropped track");

        Ok(Self {
            meta: track.meta().clone(),
            kind: track.kind(),
            samples: track.samples()[from..to].to_vec(),
            decoding,
            composition,
            sync,
            dependencies,
            description: track.sample_description().clone(),
        })
    }
}

/// Keep the part of each `(count, value)` run that overlaps `from..to`.
fn crop_runs<T: Copy>(runs: impl Iterator<Item = (u32, T)>, from: usize, to: usize) -> Vec<(u32, T)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for (count, value) in runs {
        let end = start + count as usize;
        let lo = start.max(from);
        let hi = end.min(to);
        if lo < hi {
            out.push(((hi - lo) as u32, value));
        }
        start = end;
        if start >= to {
            break;
        }
    }
    out
}

fn push_run<T: Copy + PartialEq>(runs: &mut Vec<(u32, T)>, count: u32, value: T) {
    match runs.last_mut() {
        Some((c, v)) if *v == value => *c += count,
        _ => runs.push((count, value)),
    }
}

/// Several tracks played back to back as one.
///
/// All parts must share media kind, timescale and sample description.
#[derive(Debug, Clone)]
pub struct AppendTrack {
    meta: TrackMeta,
    kind: MediaKind,
    samples: Vec<Payload>,
    decoding: Vec<TimeToSampleEntry>,
    composition: Vec<CompositionOffsetEntry>,
    sync: Option<Vec<u32>>,
    dependencies: Vec<SampleDependency>,
    description: BoxTree,
}

impl AppendTrack {
    pub fn new(tracks: &[&dyn Track]) -> Result<Self> {
        let first = *tracks
            .first()
            .ok_or_else(|| Error::IncompatibleTracks("nothing to append".into()))?;
        let description = first.sample_description().clone();
        let reference = description.to_bytes()?;
        for t in &tracks[1..] {
            if t.kind() != first.kind() {
                return Err(Error::IncompatibleTracks(format!(
                    "track {} is {:?}, track {} is {:?}",
                    first.meta().track_id,
                    first.kind(),
                    t.meta().track_id,
                    t.kind()
                )));
            }
            if t.meta().timescale != first.meta().timescale {
                return Err(Error::IncompatibleTracks(format!(
                    "timescales {} and {} differ",
                    first.meta().timescale,
                    t.meta().timescale
                )));
            }
            if t.sample_description().to_bytes()? != reference {
                return Err(Error::IncompatibleTracks(format!(
                    "track {} has a different sample description",
                    t.meta().track_id
                )));
            }
        }

        let mut samples = Vec::new();
        let mut decoding = Vec::new();
        let mut composition = Vec::new();
        let any_composition = tracks.iter().any(|t| !t.composition_time_entries().is_empty());
        let any_sync_table = tracks.iter().any(|t| t.sync_samples().is_some());
        let mut sync = Vec::new();
        let all_deps = tracks.iter().all(|t| t.sample_dependencies().len() == t.samples().len());
        let mut dependencies = Vec::new();

        for t in tracks {
            let base = samples.len() as u32;
            let n = t.samples().len() as u32;
            samples.extend_from_slice(t.samples());
            for e in t.decoding_time_entries() {
                push_run(&mut decoding, e.count, e.delta);
            }
            if any_composition {
                if t.composition_time_entries().is_empty() {
                    push_run(&mut composition, n, 0i32);
                } else {
                    for e in t.composition_time_entries() {
                        push_run(&mut composition, e.count, e.offset);
                    }
                }
            }
            if any_sync_table {
                match t.sync_samples() {
                    Some(s) => sync.extend(s.iter().map(|&k| k + base)),
                    None => sync.extend((1..=n).map(|k| k + base)),
                }
            }
            if all_deps {
                dependencies.extend_from_slice(t.sample_dependencies());
            }
        }
        if !all_deps && tracks.iter().any(|t| !t.sample_dependencies().is_empty()) {
            warn!("sample dependencies missing on some appended tracks, dropping them");
        }
        debug!(parts = tracks.len(), samples = samples.len(), "appended tracks");

        Ok(Self {
            meta: first.meta().clone(),
            kind: first.kind(),
            samples,
            decoding: decoding
                .into_iter()
                .map(|(count, delta)| TimeToSampleEntry { count, delta })
                .collect(),
            composition: composition
                .into_iter()
                .map(|(count, offset)| CompositionOffsetEntry { count, offset })
                .collect(),
            sync: any_sync_table.then_some(sync),
            dependencies,
            description,
        })
    }
}

/// Another track with its decoding and composition times expressed in a
/// different timescale.
///
/// Each sample's absolute time is rescaled and rounded to the nearest tick,
/// and the deltas are taken between neighbours, so rounding never adds up
/// over the length of the track. Times that land on whole ticks of the new
/// timescale are kept exactly.
#[derive(Debug, Clone)]
pub struct ChangeTimeScaleTrack {
    meta: TrackMeta,
    kind: MediaKind,
    samples: Vec<Payload>,
    decoding: Vec<TimeToSampleEntry>,
    composition: Vec<CompositionOffsetEntry>,
    sync: Option<Vec<u32>>,
    dependencies: Vec<SampleDependency>,
    description: BoxTree,
}

impl ChangeTimeScaleTrack {
    pub fn new(track: &dyn Track, timescale: u32) -> Result<Self> {
        let track_id = track.meta().track_id;
        let from = track.meta().timescale;
        let bad = |reason: String| Error::InconsistentTrack { track_id, reason };
        if from == 0 || timescale == 0 {
            return Err(bad(format!("cannot rescale from {from} to {timescale}")));
        }

        // Start time of every sample, then the end of the last one.
        let mut starts = Vec::with_capacity(track.samples().len() + 1);
        let mut t = 0i128;
        for e in track.decoding_time_entries() {
            for _ in 0..e.count {
                starts.push(t);
                t += e.delta as i128;
            }
        }
        starts.push(t);
        let scaled: Vec<i128> = starts.iter().map(|&t| rescale_nearest(t, from, timescale)).collect();

        let mut decoding = Vec::new();
        for pair in scaled.windows(2) {
            let delta = u32::try_from(pair[1] - pair[0])
                .map_err(|_| bad(format!("delta {} does not fit 32 bits", pair[1] - pair[0])))?;
            push_run(&mut decoding, 1, delta);
        }

        let mut composition = Vec::new();
        let mut index = 0usize;
        for e in track.composition_time_entries() {
            for _ in 0..e.count {
                if index + 1 >= starts.len() {
                    return Err(bad("composition offsets cover more samples than the track".into()));
                }
                let cts = rescale_nearest(starts[index] + e.offset as i128, from, timescale);
                let offset = i32::try_from(cts - scaled[index]).map_err(|_| {
                    bad(format!("composition offset {} does not fit 32 bits", cts - scaled[index]))
                })?;
                push_run(&mut composition, 1, offset);
                index += 1;
            }
        }
        debug!(track_id, from, to = timescale, "rescaled track");

        let mut meta = track.meta().clone();
        meta.timescale = timescale;
        Ok(Self {
            meta,
            kind: track.kind(),
            samples: track.samples().to_vec(),
            decoding: decoding
                .into_iter()
                .map(|(count, delta)| TimeToSampleEntry { count, delta })
                .collect(),
            composition: composition
                .into_iter()
                .map(|(count, offset)| CompositionOffsetEntry { count, offset })
                .collect(),
            sync: track.sync_samples().map(<[u32]>::to_vec),
            dependencies: track.sample_dependencies().to_vec(),
            description: track.sample_description().clone(),
        })
    }

    /// The smallest timescale into which every track converts without
    /// rounding, or `None` when it does not fit 32 bits.
    pub fn common_timescale(tracks: &[&dyn Track]) -> Option<u32> {
        let scale = tracks.iter().try_fold(1u64, |acc, t| {
            let l = lcm(acc, t.meta().timescale as u64);
            (l <= u32::MAX as u64).then_some(l)
        })?;
        u32::try_from(scale).ok().filter(|&s| s > 0)
    }
}

/// `value` ticks of `from` in ticks of `to`, rounded half away from zero.
fn rescale_nearest(value: i128, from: u32, to: u32) -> i128 {
    let scaled = value * to as i128;
    let from = from as i128;
    if scaled >= 0 { (scaled + from / 2) / from } else { (scaled - from / 2) / from }
}

owned_track!(CroppedTrack);
owned_track!(AppendTrack);
owned_track!(ChangeTimeScaleTrack);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_runs_keeps_overlap() {
        let runs = vec![(3u32, 10u32), (2, 20), (4, 30)];
        assert_eq!(crop_runs(runs.clone().into_iter(), 2, 6), vec![(1, 10), (2, 20), (1, 30)]);
        assert_eq!(crop_runs(runs.into_iter(), 5, 9), vec![(4, 30)]);
    }

    #[test]
    fn rescale_rounds_to_nearest_tick() {
        assert_eq!(rescale_nearest(1, 3, 10), 3);
        assert_eq!(rescale_nearest(2, 3, 10), 7);
        assert_eq!(rescale_nearest(-2, 3, 10), -7);
        assert_eq!(rescale_nearest(1001, 30_000, 90_000), 3003);
    }

    #[test]
    fn push_run_merges_equal_values() {
        let mut runs = vec![(2u32, 5u32)];
        push_run(&mut runs, 3, 5);
        push_run(&mut runs, 1, 6);
        assert_eq!(runs, vec![(5, 5), (1, 6)]);
    }
}
