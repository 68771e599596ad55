mod common;

use common::bx;
use mp4tree::{BoxNode, BoxRegistry, DiagnosticKind, FourCC, ParseOptions, RangeState, parse, parse_with};
use std::io::Cursor;

fn nested_moov(levels: usize) -> Vec<u8> {
    let mut data = bx(b"free", &[]);
    for _ in 0..levels {
        data = bx(b"moov", &data);
    }
    data
}

fn moov_levels(node: &BoxNode) -> usize {
    let below = node
        .children
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|c| c.typ() == FourCC(*b"moov"))
        .map(moov_levels)
        .max()
        .unwrap_or(0);
    1 + below
}

#[test]
fn hundred_nested_containers_hit_the_default_limit_once() {
    let data = nested_moov(100);
    let out = parse(Cursor::new(&data), data.len() as u64).unwrap();

    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::MaxDepthExceeded);
    assert_eq!(out.state, RangeState::Done);
    assert_eq!(out.boxes.len(), 1);
    assert_eq!(moov_levels(&out.boxes[0]), 65);
}

#[test]
fn deepest_walked_container_has_empty_children() {
    let data = nested_moov(10);
    let out = parse_with(
        Cursor::new(&data),
        data.len() as u64,
        &BoxRegistry::standard(),
        ParseOptions { max_depth: 3 },
    )
    .unwrap();

    let mut node = &out.boxes[0];
    for _ in 0..3 {
        node = &node.children.as_ref().unwrap()[0];
    }
    assert_eq!(node.children.as_deref(), Some(&[][..]));
    // 3 levels of 8-byte headers precede the cut-off box, and every level ends with the file
    assert_eq!(out.diagnostics[0].offset, 24);
    assert_eq!(node.end(), data.len() as u64);
    assert_eq!(node.size(), data.len() as u64 - 24);
}

#[test]
fn shallow_tree_is_untouched_by_the_limit() {
    let data = nested_moov(5);
    let out = parse_with(
        Cursor::new(&data),
        data.len() as u64,
        &BoxRegistry::standard(),
        ParseOptions { max_depth: 5 },
    )
    .unwrap();
    assert!(out.is_clean());
    assert_eq!(out.boxes[0].find(FourCC(*b"free")).map(|b| b.size()), Some(8));
}
