use mp4forge::boxes::ContainerPrefix;
use mp4forge::sample_table::{
    CompositionOffsetEntry, SampleDependency, TimeToSampleEntry, VisualSampleEntry,
};
use mp4forge::track::single_entry_stsd;
use mp4forge::{
    AppendTrack, BuildOptions, ChangeTimeScaleTrack, CroppedTrack, Error, FourCC, MediaKind,
    MemoryTrack, Movie, MovieCreator, Mp4Builder, Payload, Track, TrackMeta,
};
use std::fs::File;
use std::io::BufWriter;

fn video(id: u32, width: u16) -> MemoryTrack {
    let stsd = single_entry_stsd(
        FourCC(*b"avc1"),
        ContainerPrefix::Visual(VisualSampleEntry::new(width, 90)),
    ).expect("stsd");
    let meta = TrackMeta { track_id: id, timescale: 90_000, ..TrackMeta::default() };
    MemoryTrack::new(MediaKind::Video, meta, stsd)
}

/// Six samples: deltas 10,10,20,20,20,20; sync at 1 and 4; samples are
/// filled with their 1-based number.
fn six_samples(id: u32) -> MemoryTrack {
    let mut t = video(id, 160);
    for i in 1..=6u8 {
        let delta = if i <= 2 { 10 } else { 20 };
        t.push_sample(vec![i; i as usize], delta, i == 1 || i == 4);
    }
    t.with_composition_offsets(vec![
        CompositionOffsetEntry { count: 3, offset: 5 },
        CompositionOffsetEntry { count: 3, offset: -5 },
    ])
}

fn first_bytes(track: &dyn Track) -> Vec<u8> {
    track
        .samples()
        .iter()
        .map(|s| s.to_bytes().expect("sample")[0])
        .collect()
}

#[test]
fn crop_recomputes_tables() {
    let source = six_samples(1);
    let cropped = CroppedTrack::new(&source, 1, 5).expect("crop");

    assert_eq!(first_bytes(&cropped), vec![2, 3, 4, 5]);
    assert_eq!(
        cropped.decoding_time_entries(),
        &[TimeToSampleEntry { count: 1, delta: 10 }, TimeToSampleEntry { count: 3, delta: 20 }]
    );
    assert_eq!(
        cropped.composition_time_entries(),
        &[
            CompositionOffsetEntry { count: 2, offset: 5 },
            CompositionOffsetEntry { count: 2, offset: -5 },
        ]
    );
    assert_eq!(cropped.sync_samples(), Some(&[3u32][..]));
    assert_eq!(cropped.meta(), source.meta());
}

#[test]
fn crop_keeps_dependencies_only_when_complete() {
    let deps = vec![SampleDependency { depends_on: 2, ..SampleDependency::default() }; 6];
    let source = six_samples(1).with_dependencies(deps);
    let cropped = CroppedTrack::new(&source, 4, 6).expect("crop");
    assert_eq!(cropped.sample_dependencies().len(), 2);

    let partial = six_samples(1)
        .with_dependencies(vec![SampleDependency::default(); 3]);
    let cropped = CroppedTrack::new(&partial, 2, 6).expect("crop");
    assert!(cropped.sample_dependencies().is_empty());
}

#[test]
fn crop_rejects_bad_windows() {
    let source = six_samples(9);
    for (from, to) in [(3, 3), (4, 2), (0, 7)] {
        let err = CroppedTrack::new(&source, from, to).unwrap_err();
        assert!(matches!(err, Error::InconsistentTrack { track_id: 9, .. }), "{from}..{to}");
    }
}

#[test]
fn append_concatenates_and_shifts_sync_samples() {
    let a = six_samples(1);
    let b = six_samples(2);
    let joined = AppendTrack::new(&[&a, &b]).expect("append");

    assert_eq!(joined.samples().len(), 12);
    assert_eq!(first_bytes(&joined), vec![1, 2, 3, 4, 5, 6, 1, 2, 3, 4, 5, 6]);
    assert_eq!(joined.sync_samples(), Some(&[1u32, 4, 7, 10][..]));
    assert_eq!(
        joined.decoding_time_entries(),
        &[
            TimeToSampleEntry { count: 2, delta: 10 },
            TimeToSampleEntry { count: 4, delta: 20 },
            TimeToSampleEntry { count: 2, delta: 10 },
            TimeToSampleEntry { count: 4, delta: 20 },
        ]
    );
    assert_eq!(joined.meta().track_id, 1);
}

#[test]
fn append_fills_missing_tables() {
    let a = six_samples(1);
    let mut b = video(2, 160);
    for _ in 0..3 {
        b.push_sample(vec![0u8; 2], 20, true);
    }
    let joined = AppendTrack::new(&[&a, &b]).expect("append");

    // `b` has no sync table: all of its samples are sync.
    assert_eq!(joined.sync_samples(), Some(&[1u32, 4, 7, 8, 9][..]));
    assert_eq!(
        joined.composition_time_entries().last(),
        Some(&CompositionOffsetEntry { count: 3, offset: 0 })
    );
}

#[test]
fn append_rejects_mismatched_tracks() {
    let a = six_samples(1);

    let mut other_size = video(2, 320);
    other_size.push_sample(vec![0u8], 10, true);
    let err = AppendTrack::new(&[&a, &other_size]).unwrap_err();
    assert!(matches!(err, Error::IncompatibleTracks(_)));

    let mut other_scale = video(3, 160);
    other_scale.meta_mut().timescale = 1000;
    other_scale.push_sample(vec![0u8], 10, true);
    let err = AppendTrack::new(&[&a, &other_scale]).unwrap_err();
    assert!(matches!(err, Error::IncompatibleTracks(_)));

    assert!(matches!(AppendTrack::new(&[]), Err(Error::IncompatibleTracks(_))));
}

/// Presentation time of every sample, in ticks of the track's timescale.
fn show_times(track: &dyn Track) -> Vec<i64> {
    let mut dts = Vec::new();
    let mut t = 0i64;
    for e in track.decoding_time_entries() {
        for _ in 0..e.count {
            dts.push(t);
            t += e.delta as i64;
        }
    }
    let mut offsets = Vec::new();
    for e in track.composition_time_entries() {
        offsets.extend(std::iter::repeat_n(e.offset as i64, e.count as usize));
    }
    offsets.resize(dts.len(), 0);
    dts.iter().zip(offsets).map(|(d, o)| d + o).collect()
}

#[test]
fn rescaling_to_a_common_timescale_keeps_show_times() {
    let mut picture = six_samples(1);
    picture.meta_mut().timescale = 600;
    let mut sound = video(2, 160);
    sound.meta_mut().timescale = 1000;
    sound.push_sample(vec![0u8; 4], 1000, true);

    let common = ChangeTimeScaleTrack::common_timescale(&[&picture, &sound]).expect("fits");
    assert_eq!(common, 3000);

    let rescaled = ChangeTimeScaleTrack::new(&picture, common).expect("rescale");
    assert_eq!(rescaled.meta().timescale, 3000);
    assert_eq!(
        rescaled.decoding_time_entries(),
        &[TimeToSampleEntry { count: 2, delta: 50 }, TimeToSampleEntry { count: 4, delta: 100 }]
    );
    assert_eq!(
        rescaled.composition_time_entries(),
        &[
            CompositionOffsetEntry { count: 3, offset: 25 },
            CompositionOffsetEntry { count: 3, offset: -25 },
        ]
    );
    let expected: Vec<i64> = show_times(&picture).iter().map(|t| t * 5).collect();
    assert_eq!(show_times(&rescaled), expected);
    assert_eq!(rescaled.sync_samples(), picture.sync_samples());
    assert_eq!(first_bytes(&rescaled), first_bytes(&picture));
}

#[test]
fn rescaling_rounds_without_drift() {
    let mut t = video(1, 160);
    t.meta_mut().timescale = 3;
    for _ in 0..3 {
        t.push_sample(vec![1u8], 1, true);
    }
    let rescaled = ChangeTimeScaleTrack::new(&t, 10).expect("rescale");
    let deltas: Vec<u32> = rescaled
        .decoding_time_entries()
        .iter()
        .flat_map(|e| std::iter::repeat_n(e.delta, e.count as usize))
        .collect();
    assert_eq!(deltas, vec![3, 4, 3]);
    assert_eq!(mp4forge::track::track_duration(&rescaled), 10);
}

#[test]
fn rescaling_rejects_bad_timescales() {
    let source = six_samples(4);
    let err = ChangeTimeScaleTrack::new(&source, 0).unwrap_err();
    assert!(matches!(err, Error::InconsistentTrack { track_id: 4, .. }));

    let mut a = video(1, 160);
    a.meta_mut().timescale = u32::MAX;
    let mut b = video(2, 160);
    b.meta_mut().timescale = u32::MAX - 1;
    assert_eq!(ChangeTimeScaleTrack::common_timescale(&[&a, &b]), None);
}

#[test]
fn remux_through_files_keeps_samples() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = dir.path().join("in.mp4");
    let remuxed = dir.path().join("out.mp4");
    let options = BuildOptions { creation_time: Some(3_600_000_000), ..BuildOptions::default() };

    let mut movie = Movie::new();
    movie.add_track(six_samples(1));
    let tree = Mp4Builder::new(options.clone()).build(&movie).expect("build");
    tree.write(&mut BufWriter::new(File::create(&original).expect("create"))).expect("write");

    let read = MovieCreator::open(&original).expect("open");
    let track = read.track_by_id(1).expect("track 1");
    assert!(track.samples().iter().all(|s| matches!(s, Payload::Range(_))));
    assert_eq!(
        track.composition_time_entries(),
        six_samples(1).composition_time_entries()
    );

    let cropped = CroppedTrack::new(track, 3, 6).expect("crop");
    let appended = AppendTrack::new(&[track, &cropped]).expect("append");
    let mut out = Movie::new();
    out.add_track(appended);
    let tree = Mp4Builder::new(options).build(&out).expect("build");
    tree.write(&mut BufWriter::new(File::create(&remuxed).expect("create"))).expect("write");

    let back = MovieCreator::open(&remuxed).expect("reopen");
    let track = back.track_by_id(1).expect("track 1");
    assert_eq!(first_bytes(track), vec![1, 2, 3, 4, 5, 6, 4, 5, 6]);
    let sizes: Vec<u64> = track.samples().iter().map(Payload::len).collect();
    assert_eq!(sizes, vec![1, 2, 3, 4, 5, 6, 4, 5, 6]);
    assert_eq!(track.sync_samples(), Some(&[1u32, 4, 7][..]));
}
