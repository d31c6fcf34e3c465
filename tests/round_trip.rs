use mp4forge::boxes::ContainerPrefix;
use mp4forge::sample_table::VisualSampleEntry;
use mp4forge::track::single_entry_stsd;
use mp4forge::{
    BoxData, BuildOptions, FourCC, IsoFile, MediaKind, MemoryTrack, Movie, Mp4Builder, TrackMeta,
};

fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

fn full(version: u8, flags: u32, rest: &[u8]) -> Vec<u8> {
    let mut v = vec![version];
    v.extend_from_slice(&flags.to_be_bytes()[1..]);
    v.extend_from_slice(rest);
    v
}

fn built_file() -> Vec<u8> {
    let stsd = single_entry_stsd(
        FourCC(*b"avc1"),
        ContainerPrefix::Visual(VisualSampleEntry::new(64, 48)),
    ).expect("stsd");
    let meta = TrackMeta { width: 64.0, height: 48.0, timescale: 25, ..TrackMeta::default() };
    let mut track = MemoryTrack::new(MediaKind::Video, meta, stsd);
    for i in 0..6u8 {
        track.push_sample(vec![i; 5 + i as usize], 1, i % 3 == 0);
    }
    let mut movie = Movie::new();
    movie.add_track(track);

    let options = BuildOptions { creation_time: Some(3_600_000_000), ..BuildOptions::default() };
    let tree = Mp4Builder::new(options).build(&movie).expect("build");
    tree.to_bytes().expect("write")
}

#[test]
fn built_movie_round_trips_byte_for_byte() {
    let bytes = built_file();
    let file = IsoFile::from_bytes(bytes.clone()).expect("parse");
    assert_eq!(file.size(), bytes.len() as u64);
    assert_eq!(file.to_bytes().expect("write"), bytes);

    // Every typed leaf decoded rather than falling back to opaque bytes.
    let tree = file.boxes();
    for path in [
        "moov/mvhd",
        "moov/trak/tkhd",
        "moov/trak/mdia/mdhd",
        "moov/trak/mdia/hdlr",
        "moov/trak/mdia/minf/vmhd",
        "moov/trak/mdia/minf/stbl/stts",
        "moov/trak/mdia/minf/stbl/stss",
        "moov/trak/mdia/minf/stbl/stsc",
        "moov/trak/mdia/minf/stbl/stsz",
        "moov/trak/mdia/minf/stbl/stco",
    ] {
        let id = tree.find_path(None, path).unwrap_or_else(|| panic!("missing {path}"));
        assert!(
            !matches!(tree.node(id).data, BoxData::Raw(_) | BoxData::Container(_)),
            "{path} not decoded"
        );
    }
}

#[test]
fn uuid_large_and_trailing_bytes_survive() {
    let mut data = Vec::new();

    // Compact uuid box.
    data.extend_from_slice(&28u32.to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&[0x5a; 16]);
    data.extend_from_slice(b"abcd");

    // 64-bit size form holding only a few bytes.
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&19u64.to_be_bytes());
    data.extend_from_slice(&[1, 2, 3]);

    // stss with three bytes after its entries.
    let mut stss = full(0, 0, &1u32.to_be_bytes());
    stss.extend_from_slice(&7u32.to_be_bytes());
    stss.extend_from_slice(&[0xde, 0xad, 0xbf]);
    data.extend_from_slice(&boxed(b"stbl", &boxed(b"stss", &stss)));

    let file = IsoFile::from_bytes(data.clone()).expect("parse");
    let tree = file.boxes();
    assert_eq!(tree.roots().len(), 3);
    assert_eq!(tree.node(tree.roots()[0]).uuid, Some([0x5a; 16]));
    assert!(tree.node(tree.roots()[1]).large_size);
    assert_eq!(tree.header_size(tree.roots()[1]), 16);

    let stss_id = tree.find_path(None, "stbl/stss").expect("stss");
    assert_eq!(tree.node(stss_id).trailing.as_ref(), &[0xde, 0xad, 0xbf]);
    match &tree.node(stss_id).data {
        BoxData::SyncSample(b) => assert_eq!(b.sample_numbers, vec![7]),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(file.to_bytes().expect("write"), data);
}

#[test]
fn editing_a_box_updates_sizes_and_offsets() {
    let bytes = built_file();
    let mut file = IsoFile::from_bytes(bytes.clone()).expect("parse");
    let tree = file.boxes_mut();
    let ftyp = tree.root_of_type(b"ftyp").expect("ftyp");
    let moov = tree.root_of_type(b"moov").expect("moov");
    let moov_offset = tree.offset_of(moov);
    let ftyp_size = tree.size(ftyp);

    if let BoxData::FileType(f) = &mut tree.node_mut(ftyp).data {
        f.compatible_brands.push(FourCC(*b"mp42"));
    }
    assert_eq!(tree.size(ftyp), ftyp_size + 4);
    assert_eq!(tree.offset_of(moov), moov_offset + 4);

    let out = tree.to_bytes().expect("write");
    assert_eq!(out.len(), bytes.len() + 4);
    assert_eq!(&out[4..8], b"ftyp");
    assert_eq!(u32::from_be_bytes([out[0], out[1], out[2], out[3]]) as u64, ftyp_size + 4);

    let reparsed = IsoFile::from_bytes(out).expect("reparse");
    assert_eq!(reparsed.boxes().roots().len(), 3);
}

#[test]
fn extracted_subtree_writes_standalone() {
    let bytes = built_file();
    let file = IsoFile::from_bytes(bytes.clone()).expect("parse");
    let tree = file.boxes();
    let stbl = tree.find_path(None, "moov/trak/mdia/minf/stbl").expect("stbl");
    let offset = tree.offset_of(stbl) as usize;
    let size = tree.size(stbl) as usize;

    let sub = tree.extract(stbl).expect("extract");
    assert_eq!(sub.to_bytes().expect("write"), &bytes[offset..offset + size]);
}

fn unity_matrix() -> Vec<u8> {
    let mut m = Vec::new();
    for v in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        m.extend_from_slice(&v.to_be_bytes());
    }
    m
}

/// A `moov` written the way QuickTime writes it: the preview, poster,
/// selection and current times of `mvhd` are set, reserved words are not
/// zero and the language word has its top bit set.
fn quicktime_moov() -> Vec<u8> {
    let mut mvhd = Vec::new();
    for v in [100u32, 200, 600, 1200, 0x0001_0000] {
        mvhd.extend_from_slice(&v.to_be_bytes());
    }
    mvhd.extend_from_slice(&0x0100u16.to_be_bytes());
    mvhd.extend_from_slice(&[0xA0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    mvhd.extend_from_slice(&unity_matrix());
    for v in [10u32, 20, 30, 40, 50, 60] {
        mvhd.extend_from_slice(&v.to_be_bytes());
    }
    mvhd.extend_from_slice(&3u32.to_be_bytes());
    let mvhd = boxed(b"mvhd", &full(0, 0, &mvhd));

    let mut tkhd = Vec::new();
    for v in [100u32, 200, 1, 7, 1200] {
        tkhd.extend_from_slice(&v.to_be_bytes());
    }
    tkhd.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    tkhd.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    tkhd.extend_from_slice(&9u16.to_be_bytes());
    tkhd.extend_from_slice(&unity_matrix());
    tkhd.extend_from_slice(&[0, 0x40, 0, 0, 0, 0x30, 0, 0]);
    let tkhd = boxed(b"tkhd", &full(0, 0xF, &tkhd));

    let mut mdhd = Vec::new();
    for v in [100u32, 200, 600, 1200] {
        mdhd.extend_from_slice(&v.to_be_bytes());
    }
    mdhd.extend_from_slice(&0x95C7u16.to_be_bytes());
    mdhd.extend_from_slice(&0x0200u16.to_be_bytes());
    let mdhd = boxed(b"mdhd", &full(0, 0, &mdhd));

    let smhd = boxed(b"smhd", &full(0, 0, &[0, 0, 0xBE, 0xEF]));
    let mut hmhd = Vec::new();
    for v in [1400u16, 700] {
        hmhd.extend_from_slice(&v.to_be_bytes());
    }
    for v in [8000u32, 4000, 0xDEAD_BEEF] {
        hmhd.extend_from_slice(&v.to_be_bytes());
    }
    let hmhd = boxed(b"hmhd", &full(0, 0, &hmhd));

    let mut avc1 = vec![1, 2, 3, 4, 5, 6];
    avc1.extend_from_slice(&1u16.to_be_bytes());
    avc1.extend_from_slice(&[0u8; 16]);
    avc1.extend_from_slice(&64u16.to_be_bytes());
    avc1.extend_from_slice(&48u16.to_be_bytes());
    avc1.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    avc1.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    avc1.extend_from_slice(&0x1234u32.to_be_bytes());
    avc1.extend_from_slice(&1u16.to_be_bytes());
    avc1.extend_from_slice(&[0u8; 32]);
    avc1.extend_from_slice(&0x18u16.to_be_bytes());
    avc1.extend_from_slice(&(-1i16).to_be_bytes());

    let mut mp4a = vec![6, 5, 4, 3, 2, 1];
    mp4a.extend_from_slice(&1u16.to_be_bytes());
    mp4a.extend_from_slice(&[0u8; 8]);
    mp4a.extend_from_slice(&2u16.to_be_bytes());
    mp4a.extend_from_slice(&16u16.to_be_bytes());
    mp4a.extend_from_slice(&[0u8; 4]);
    mp4a.extend_from_slice(&(44_100u32 << 16).to_be_bytes());

    let mut stsd = full(0, 0, &2u32.to_be_bytes());
    stsd.extend_from_slice(&boxed(b"avc1", &avc1));
    stsd.extend_from_slice(&boxed(b"mp4a", &mp4a));
    let stbl = boxed(b"stbl", &boxed(b"stsd", &stsd));

    let mut minf = smhd;
    minf.extend_from_slice(&hmhd);
    minf.extend_from_slice(&stbl);
    let mut mdia = mdhd;
    mdia.extend_from_slice(&boxed(b"minf", &minf));
    let mut trak = tkhd;
    trak.extend_from_slice(&boxed(b"mdia", &mdia));
    let mut moov = mvhd;
    moov.extend_from_slice(&boxed(b"trak", &trak));
    boxed(b"moov", &moov)
}

#[test]
fn quicktime_header_fields_round_trip() {
    let data = quicktime_moov();
    let file = IsoFile::from_bytes(data.clone()).expect("parse");
    let tree = file.boxes();

    let mvhd = tree.find_path(None, "moov/mvhd").expect("mvhd");
    match &tree.node(mvhd).data {
        BoxData::MovieHeader(m) => {
            assert_eq!(m.reserved[0], 0xA0);
            assert_eq!(&m.pre_defined[..8], &[0, 0, 0, 10, 0, 0, 0, 20]);
            assert_eq!(m.next_track_id, 3);
        }
        other => panic!("unexpected {other:?}"),
    }
    let tkhd = tree.find_path(None, "moov/trak/tkhd").expect("tkhd");
    match &tree.node(tkhd).data {
        BoxData::TrackHeader(t) => {
            assert_eq!(t.reserved, (7, [1, 2, 3, 4, 5, 6, 7, 8], 9));
            assert_eq!(t.width, 64.0);
        }
        other => panic!("unexpected {other:?}"),
    }
    let mdhd = tree.find_path(None, "moov/trak/mdia/mdhd").expect("mdhd");
    match &tree.node(mdhd).data {
        BoxData::MediaHeader(m) => {
            assert_eq!(m.language, "eng");
            assert!(m.language_pad);
        }
        other => panic!("unexpected {other:?}"),
    }
    let avc1 = tree.find_path(None, "moov/trak/mdia/minf/stbl/stsd/avc1").expect("avc1");
    match &tree.node(avc1).data {
        BoxData::Container(c) => assert_eq!(c.prefix.visual().map(|v| v.data_size), Some(0x1234)),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(file.to_bytes().expect("write"), data);
}
