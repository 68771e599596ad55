#![allow(dead_code)]

use mp4tree::header::header_len;
use mp4tree::{BoxClass, BoxNode, BoxRegistry, FourCC, SizeEncoding, write_box};

/// A box with a 32-bit size and the given payload.
pub fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// Synthetic box tree used to build files and check what the parser makes of them.
pub enum Synth {
    Leaf {
        typ: [u8; 4],
        uuid: Option<[u8; 16]>,
        enc: SizeEncoding,
        payload: usize,
    },
    Container {
        typ: [u8; 4],
        enc: SizeEncoding,
        children: Vec<Synth>,
    },
}

impl Synth {
    pub fn leaf(typ: &[u8; 4], enc: SizeEncoding, payload: usize) -> Self {
        Synth::Leaf { typ: *typ, uuid: None, enc, payload }
    }

    pub fn uuid(ext: [u8; 16], enc: SizeEncoding, payload: usize) -> Self {
        Synth::Leaf { typ: *b"uuid", uuid: Some(ext), enc, payload }
    }

    pub fn container(typ: &[u8; 4], enc: SizeEncoding, children: Vec<Synth>) -> Self {
        Synth::Container { typ: *typ, enc, children }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Synth::Leaf { typ, uuid, enc, payload } => {
                write_box(out, FourCC(*typ), *uuid, *enc, &vec![0xA5; *payload]);
            }
            Synth::Container { typ, enc, children } => {
                let mut body = Vec::new();
                for c in children {
                    c.encode(&mut body);
                }
                write_box(out, FourCC(*typ), None, *enc, &body);
            }
        }
    }

    /// Assert `node` is what this synth encodes to when placed at `start`;
    /// returns the offset just past it.
    pub fn check(&self, node: &BoxNode, start: u64, reg: &BoxRegistry) -> u64 {
        assert_eq!(node.start(), start, "offset of {}", node.typ());
        match self {
            Synth::Leaf { typ, uuid, enc, payload } => {
                let hl = header_len(*enc, uuid.is_some());
                assert_eq!(node.typ(), FourCC(*typ));
                assert_eq!(node.header.uuid, *uuid);
                assert_eq!(node.header.header_size, hl);
                assert_eq!(node.size(), hl + *payload as u64);
                assert_eq!(node.class, reg.classify(FourCC(*typ)));
                assert_ne!(node.class, BoxClass::Container);
                assert!(node.children.is_none());
            }
            Synth::Container { typ, enc, children } => {
                let hl = header_len(*enc, false);
                assert_eq!(node.typ(), FourCC(*typ));
                assert_eq!(node.class, BoxClass::Container);
                assert_eq!(node.header.header_size, hl);
                let kids = node.children.as_ref().expect("container has children");
                assert_eq!(kids.len(), children.len());

                let mut pos = start + hl;
                for (s, n) in children.iter().zip(kids) {
                    pos = s.check(n, pos, reg);
                }
                // children exactly cover the payload
                assert_eq!(pos, node.end());
                let sum: u64 = kids.iter().map(|k| k.size()).sum();
                assert_eq!(sum, node.size() - hl);
            }
        }
        node.end()
    }
}
