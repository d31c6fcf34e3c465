use mp4forge::boxes::{header_size_for, needs_large_size};
use mp4forge::{BoxData, Error, FourCC, IsoFile, read_box_header};
use std::io::Cursor;

fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

#[test]
fn reads_compact_header() {
    let data = boxed(b"free", &[0u8; 4]);
    let mut cur = Cursor::new(data);
    let hdr = read_box_header(&mut cur).expect("header");

    assert_eq!(hdr.size, 12);
    assert_eq!(hdr.typ, FourCC(*b"free"));
    assert_eq!(hdr.header_size, 8);
    assert_eq!(hdr.content_size(), 4);
    assert_eq!(hdr.start, 0);
    assert!(!hdr.large);
    assert!(hdr.uuid.is_none());
}

#[test]
fn reads_large_uuid_header() {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&40u64.to_be_bytes());
    data.extend_from_slice(&[0xab; 16]);
    data.extend_from_slice(&[0u8; 8]);

    let mut cur = Cursor::new(data);
    let hdr = read_box_header(&mut cur).expect("header");
    assert!(hdr.large);
    assert_eq!(hdr.size, 40);
    assert_eq!(hdr.header_size, 32);
    assert_eq!(hdr.uuid, Some([0xab; 16]));
    assert_eq!(cur.position(), 32);
}

#[test]
fn rejects_size_below_header() {
    let mut data = Vec::new();
    data.extend_from_slice(&4u32.to_be_bytes());
    data.extend_from_slice(b"free");
    let err = read_box_header(&mut Cursor::new(data)).unwrap_err();
    assert!(matches!(err, Error::InvalidSize { offset: 0, size: 4 }));
}

#[test]
fn large_size_threshold() {
    // 0xFFFF_FFF7 content bytes plus an 8-byte header is exactly u32::MAX.
    assert!(needs_large_size(0xFFFF_FFF7, false));
    assert!(!needs_large_size(0xFFFF_FFF6, false));
    assert_eq!(header_size_for(0xFFFF_FFF7, false, false), 16);
    assert_eq!(header_size_for(0xFFFF_FFF6, false, false), 8);

    assert!(needs_large_size(0xFFFF_FFE7, true));
    assert_eq!(header_size_for(0xFFFF_FFE6, true, false), 24);
    assert_eq!(header_size_for(4, false, true), 16);
}

#[test]
fn parses_nested_containers() {
    let mut ftyp = Vec::new();
    ftyp.extend_from_slice(b"isom");
    ftyp.extend_from_slice(&512u32.to_be_bytes());
    ftyp.extend_from_slice(b"isom");
    ftyp.extend_from_slice(b"mp41");

    let trak = boxed(b"trak", &boxed(b"free", &[1, 2, 3]));
    let mut moov_body = boxed(b"udta", &[9u8; 6]);
    moov_body.extend_from_slice(&trak);

    let mut data = boxed(b"ftyp", &ftyp);
    data.extend_from_slice(&boxed(b"moov", &moov_body));

    let file = IsoFile::from_bytes(data).expect("parse");
    let tree = file.boxes();
    assert_eq!(tree.roots().len(), 2);

    let ftyp_id = tree.root_of_type(b"ftyp").expect("ftyp");
    match &tree.node(ftyp_id).data {
        BoxData::FileType(f) => {
            assert_eq!(f.major_brand, FourCC(*b"isom"));
            assert_eq!(f.minor_version, 512);
            assert_eq!(f.compatible_brands, vec![FourCC(*b"isom"), FourCC(*b"mp41")]);
        }
        other => panic!("ftyp decoded as {other:?}"),
    }

    let moov = file.movie_box().expect("moov");
    assert_eq!(tree.node(moov).offset, Some(24));
    assert_eq!(tree.children(moov).len(), 2);

    let free = tree.find_path(None, "moov/trak/free").expect("free");
    assert_eq!(tree.offset_of(free), 24 + 8 + 14 + 8);
    assert_eq!(tree.size(free), 11);
    let trak_id = tree.parent(free).expect("parent");
    assert_eq!(tree.node(trak_id).typ, FourCC(*b"trak"));
    assert_eq!(tree.parent(trak_id), Some(moov));
}

#[test]
fn child_overrunning_parent_is_structural() {
    // moov declares 16 content bytes; children claim 8 + 9.
    let mut body = boxed(b"free", &[]);
    body.extend_from_slice(&9u32.to_be_bytes());
    body.extend_from_slice(b"skip");
    let mut data = Vec::new();
    data.extend_from_slice(&24u32.to_be_bytes());
    data.extend_from_slice(b"moov");
    data.extend_from_slice(&body);
    data.push(0);

    let err = IsoFile::from_bytes(data).err().expect("must fail");
    assert!(err.is_structural(), "got {err}");
    assert!(matches!(
        err.root_cause(),
        Error::ChildOverrun { offset: 16, remaining: 8, child_size: 9 }
    ));
}

#[test]
fn root_box_past_end_of_file_is_truncated() {
    // A cut-off file: free declares 100 bytes, 28 are present.
    let mut data = Vec::new();
    data.extend_from_slice(&100u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&[0u8; 20]);

    let err = IsoFile::from_bytes(data).err().expect("must fail");
    assert!(err.is_truncated(), "got {err}");
    assert!(!err.is_structural(), "got {err}");
    assert!(matches!(err.root_cause(), Error::Truncated { needed: 72 }));
}

#[test]
fn leftover_container_bytes_are_structural() {
    let mut body = boxed(b"free", &[]);
    body.extend_from_slice(&[0u8; 4]);
    let data = boxed(b"moov", &body);

    let err = IsoFile::from_bytes(data).err().expect("must fail");
    match err.root_cause() {
        Error::StructuralMismatch { offset, declared, consumed } => {
            assert_eq!(*offset, 8);
            assert_eq!(*declared, 12);
            assert_eq!(*consumed, 8);
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn nested_zero_size_is_rejected() {
    let mut child = Vec::new();
    child.extend_from_slice(&0u32.to_be_bytes());
    child.extend_from_slice(b"free");
    let data = boxed(b"moov", &child);

    let err = IsoFile::from_bytes(data).err().expect("must fail");
    assert!(matches!(err.root_cause(), Error::ZeroSizeNotAtRoot { offset: 8 }));
}

#[test]
fn root_zero_size_extends_to_end() {
    let mut data = boxed(b"free", &[]);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[7u8; 20]);

    let file = IsoFile::from_bytes(data).expect("parse");
    let tree = file.boxes();
    let mdat = tree.root_of_type(b"mdat").expect("mdat");
    assert_eq!(tree.content_size(mdat), 20);
    assert!(matches!(tree.node(mdat).data, BoxData::MediaData(_)));
}

#[test]
fn errors_carry_the_nesting_path() {
    let mut bad = Vec::new();
    bad.extend_from_slice(&0u32.to_be_bytes());
    bad.extend_from_slice(b"free");
    let trak = boxed(b"trak", &bad);
    let data = boxed(b"moov", &trak);

    let err = IsoFile::from_bytes(data).err().expect("must fail");
    match &err {
        Error::Context { path, .. } => assert_eq!(path, "moov/trak/free"),
        other => panic!("no context: {other}"),
    }
    assert!(err.to_string().contains("moov/trak/free"));
}

#[test]
fn short_leaf_content_is_truncated() {
    // stsz claims 3 per-sample entries but carries 2.
    let mut stsz = Vec::new();
    stsz.extend_from_slice(&[0, 0, 0, 0]);
    stsz.extend_from_slice(&0u32.to_be_bytes());
    stsz.extend_from_slice(&3u32.to_be_bytes());
    stsz.extend_from_slice(&10u32.to_be_bytes());
    stsz.extend_from_slice(&11u32.to_be_bytes());
    let data = boxed(b"stbl", &boxed(b"stsz", &stsz));

    let err = IsoFile::from_bytes(data).err().expect("must fail");
    assert!(err.is_truncated(), "got {err}");
}

#[test]
fn unknown_boxes_stay_opaque() {
    let data = boxed(b"zzzz", b"hello");
    let file = IsoFile::from_bytes(data).expect("parse");
    let tree = file.boxes();
    let id = tree.roots()[0];
    match &tree.node(id).data {
        BoxData::Raw(raw) => {
            assert_eq!(raw.payload.to_bytes().expect("bytes").as_ref(), b"hello");
        }
        other => panic!("expected raw, got {other:?}"),
    }
}
