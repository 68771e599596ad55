mod common;

use common::bx;
use mp4tree::{BoxClass, BoxRegistry, FourCC, ParseOptions, Preamble, parse_with};
use std::io::Cursor;

#[test]
fn standard_registry_classifies() {
    let reg = BoxRegistry::standard();
    assert_eq!(reg.classify(FourCC(*b"moov")), BoxClass::Container);
    assert_eq!(reg.classify(FourCC(*b"trak")), BoxClass::Container);
    assert_eq!(reg.classify(FourCC(*b"ftyp")), BoxClass::Leaf);
    assert_eq!(reg.classify(FourCC(*b"mdat")), BoxClass::Leaf);
    assert_eq!(reg.classify(FourCC(*b"zzzz")), BoxClass::Unknown);
}

#[test]
fn full_names_and_preambles() {
    let reg = BoxRegistry::standard();
    assert_eq!(reg.full_name(FourCC(*b"ftyp")), "File Type Box");
    assert_eq!(reg.full_name(FourCC(*b"zzzz")), "Unknown Box");
    assert_eq!(reg.children_offset(FourCC(*b"dref")), 8);
    assert_eq!(reg.children_offset(FourCC(*b"stsd")), 8);
    assert_eq!(reg.children_offset(FourCC(*b"meta")), 4);
    assert_eq!(
        reg.preamble(FourCC(*b"meta")),
        Preamble::OptionalFullBox {
            first_child: FourCC(*b"hdlr")
        }
    );
    assert_eq!(reg.preamble(FourCC(*b"stsd")), Preamble::Fixed(8));
    assert_eq!(reg.children_offset(FourCC(*b"moov")), 0);
}

#[test]
fn empty_registry_knows_nothing() {
    let reg = BoxRegistry::new();
    assert!(reg.is_empty());
    assert_eq!(reg.classify(FourCC(*b"moov")), BoxClass::Unknown);
}

#[test]
fn registered_container_is_walked() {
    let data = bx(b"abcd", &bx(b"free", &[0; 4]));

    let plain = parse_with(
        Cursor::new(&data),
        data.len() as u64,
        &BoxRegistry::standard(),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(plain.boxes[0].class, BoxClass::Unknown);
    assert!(plain.boxes[0].children.is_none());

    let reg = BoxRegistry::standard().with_container(FourCC(*b"abcd"), "Test Container");
    let out = parse_with(Cursor::new(&data), data.len() as u64, &reg, ParseOptions::default()).unwrap();
    assert!(out.is_clean());
    let abcd = &out.boxes[0];
    assert_eq!(abcd.class, BoxClass::Container);
    let kids = abcd.children.as_ref().unwrap();
    assert_eq!(kids.len(), 1);
    assert_eq!(kids[0].start(), 8);
    assert_eq!(kids[0].size(), 12);
}

#[test]
fn overriding_a_standard_container_as_leaf() {
    let data = bx(b"moov", &bx(b"mvhd", &[]));
    let reg = BoxRegistry::standard().with_leaf(FourCC(*b"moov"), "Opaque Movie");
    let out = parse_with(Cursor::new(&data), data.len() as u64, &reg, ParseOptions::default()).unwrap();
    assert_eq!(out.boxes[0].class, BoxClass::Leaf);
    assert!(out.boxes[0].children.is_none());
}

#[test]
fn container_with_custom_preamble() {
    let mut body = vec![0xAA; 6];
    body.extend(bx(b"free", &[]));
    let data = bx(b"wrap", &body);

    let reg = BoxRegistry::new().with_container_at(FourCC(*b"wrap"), 6, "Wrapper");
    let out = parse_with(Cursor::new(&data), data.len() as u64, &reg, ParseOptions::default()).unwrap();
    assert!(out.is_clean());
    let kids = out.boxes[0].children.as_ref().unwrap();
    assert_eq!(kids[0].start(), 14);
    // not in this registry
    assert_eq!(kids[0].class, BoxClass::Unknown);
}
