use bytes::Bytes;
use mp4forge::boxes::ContainerPrefix;
use mp4forge::{
    BoxData, BoxKey, BoxKind, FourCC, IsoFile, ParseOptions, Payload, PrefixKind, Registry,
    default_registry,
};
use std::rc::Rc;

fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

fn parse(data: &[u8], registry: &Registry, options: ParseOptions) -> IsoFile {
    IsoFile::parse_with(Rc::new(Bytes::copy_from_slice(data)), registry, options).expect("parse")
}

#[test]
fn default_registry_knows_core_boxes() {
    let reg = default_registry();
    for cc in [b"moov", b"trak", b"stsd", b"stts", b"mdat", b"ftyp"] {
        assert!(reg.contains(&BoxKey::FourCC(FourCC(*cc))), "{}", FourCC(*cc));
    }
    assert!(!reg.contains(&BoxKey::FourCC(FourCC(*b"free"))));
    assert!(matches!(reg.kind_of(&BoxKey::FourCC(FourCC(*b"zzzz"))), BoxKind::Opaque));
}

#[test]
fn custom_full_container_reads_version_and_children() {
    let reg = Registry::new().with_kind(
        BoxKey::FourCC(FourCC(*b"cust")),
        BoxKind::Container(PrefixKind::Full),
    );
    let mut body = vec![1, 0, 0, 2];
    body.extend_from_slice(&boxed(b"free", &[5, 6]));
    let data = boxed(b"cust", &body);

    let file = parse(&data, &reg, ParseOptions::default());
    let tree = file.boxes();
    let cust = tree.roots()[0];
    assert_eq!(tree.node(cust).data.full_header(), Some((1, 2)));
    assert_eq!(tree.children(cust).len(), 1);
    assert_eq!(tree.offset_of(tree.children(cust)[0]), 12);
    assert_eq!(file.to_bytes().expect("write"), data);
}

#[test]
fn uuid_keys_are_looked_up_by_extended_type() {
    let id = [0x11u8; 16];
    let reg = Registry::new().with_kind(BoxKey::Uuid(id), BoxKind::Container(PrefixKind::Plain));

    let mut data = Vec::new();
    let child = boxed(b"free", &[]);
    data.extend_from_slice(&((24 + child.len()) as u32).to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&id);
    data.extend_from_slice(&child);

    let file = parse(&data, &reg, ParseOptions::default());
    let tree = file.boxes();
    let root = tree.roots()[0];
    assert_eq!(tree.node(root).key(), BoxKey::Uuid(id));
    assert_eq!(tree.children(root).len(), 1);
    assert_eq!(tree.header_size(root), 24);

    // Another extended type under the same registry stays opaque.
    let mut other = data.clone();
    other[8] = 0x22;
    let file = parse(&other, &reg, ParseOptions::default());
    assert!(matches!(file.boxes().node(file.boxes().roots()[0]).data, BoxData::Raw(_)));
}

#[test]
fn custom_leaf_leaves_unread_bytes_as_trailing() {
    let reg = Registry::new().with_kind(
        BoxKey::FourCC(FourCC(*b"cust")),
        BoxKind::Leaf(|r| {
            let mut head = [0u8; 2];
            std::io::Read::read_exact(r, &mut head)?;
            Ok(BoxData::raw(Bytes::copy_from_slice(&head)))
        }),
    );
    let data = boxed(b"cust", &[1, 2, 3, 4, 5]);

    let file = parse(&data, &reg, ParseOptions::default());
    let tree = file.boxes();
    let node = tree.node(tree.roots()[0]);
    assert_eq!(node.trailing.as_ref(), &[3, 4, 5]);
    assert_eq!(file.to_bytes().expect("write"), data);
}

#[test]
fn large_opaque_payloads_stay_lazy() {
    let data = boxed(b"zzzz", &[9u8; 10]);
    let file = parse(&data, &default_registry(), ParseOptions { lazy_threshold: 4 });
    let tree = file.boxes();
    match &tree.node(tree.roots()[0]).data {
        BoxData::Raw(raw) => {
            assert!(matches!(&raw.payload, Payload::Range(r) if r.offset == 8 && r.len == 10));
        }
        other => panic!("expected raw, got {other:?}"),
    }
    assert_eq!(file.to_bytes().expect("write"), data);
}

#[test]
fn invalid_utf8_handler_name_falls_back_to_raw() {
    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0u8; 12]);
    hdlr.extend_from_slice(&[0xff, 0xfe, 0x00]);
    let data = boxed(b"hdlr", &hdlr);

    let file = IsoFile::from_bytes(data.clone()).expect("parse");
    let tree = file.boxes();
    assert!(matches!(tree.node(tree.roots()[0]).data, BoxData::Raw(_)));
    assert_eq!(file.to_bytes().expect("write"), data);
}

#[test]
fn sample_entries_parse_their_fixed_fields() {
    let mut mp4a = vec![0u8; 6];
    mp4a.extend_from_slice(&1u16.to_be_bytes());
    mp4a.extend_from_slice(&[0u8; 8]);
    mp4a.extend_from_slice(&2u16.to_be_bytes());
    mp4a.extend_from_slice(&16u16.to_be_bytes());
    mp4a.extend_from_slice(&[0u8; 4]);
    mp4a.extend_from_slice(&(48_000u32 << 16).to_be_bytes());
    mp4a.extend_from_slice(&boxed(b"esds", &[0u8; 4]));

    let mut stsd = vec![0u8; 4];
    stsd.extend_from_slice(&1u32.to_be_bytes());
    stsd.extend_from_slice(&boxed(b"mp4a", &mp4a));
    let data = boxed(b"stsd", &stsd);

    let file = IsoFile::from_bytes(data.clone()).expect("parse");
    let tree = file.boxes();
    let stsd_id = tree.roots()[0];
    let entry = tree.children(stsd_id)[0];
    match &tree.node(entry).data {
        BoxData::Container(c) => match &c.prefix {
            ContainerPrefix::Audio(a) => {
                assert_eq!(a.channel_count, 2);
                assert_eq!(a.sample_size, 16);
                assert_eq!(a.sample_rate_hz(), 48_000);
            }
            other => panic!("unexpected prefix {other:?}"),
        },
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(tree.children(entry).len(), 1);
    assert_eq!(file.to_bytes().expect("write"), data);
}
