mod common;

use common::{bx, concat};
use mp4tree::{
    BoxDecoder, BoxHeader, BoxKey, BoxRegistry, DecoderRegistry, FourCC, Field, SizeEncoding,
    default_decoders, parse, write_box,
};
use std::io::{Cursor, Read};

const EXT: [u8; 16] = *b"0123456789abcdef";

struct ByteCount;

impl BoxDecoder for ByteCount {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let mut buf = Vec::new();
        r.read_to_end(&mut buf)?;
        Ok(vec![Field::new("bytes", buf.len()), Field::new("first", buf[0])])
    }
}

#[test]
fn registry_invokes_decoder() {
    let reg = DecoderRegistry::new().with_decoder(BoxKey::FourCC(FourCC(*b"test")), Box::new(ByteCount));

    let data = bx(b"test", &[7, 2, 3, 4]);
    let out = parse(Cursor::new(&data), data.len() as u64).unwrap();
    let hdr = &out.boxes[0].header;

    let mut payload = Cursor::new(&data[8..]);
    let fields = reg
        .decode(&BoxKey::from(hdr), &mut payload, hdr)
        .expect("decoder registered")
        .unwrap();
    assert_eq!(fields, vec![Field::new("bytes", 4), Field::new("first", 7)]);

    let other = BoxKey::FourCC(FourCC(*b"nope"));
    assert!(reg.decode(&other, &mut payload, hdr).is_none());
}

#[test]
fn uuid_decoder_sees_only_its_payload() {
    let mut data = bx(b"free", &[0xEE; 4]);
    write_box(&mut data, FourCC::UUID, Some(EXT), SizeEncoding::Compact, &[9, 8, 7]);
    data.extend(bx(b"free", &[0xEE; 4]));

    let out = parse(Cursor::new(&data), data.len() as u64).unwrap();
    assert!(out.is_clean());
    let node = &out.boxes[1];
    assert_eq!(node.header.header_size, 24);

    let reg = DecoderRegistry::new().with_decoder(BoxKey::Uuid(EXT), Box::new(ByteCount));
    let mut src = Cursor::new(&data);
    let fields = reg
        .decode_node(&mut src, node, &BoxRegistry::standard())
        .expect("decoder registered")
        .unwrap();
    assert_eq!(fields, vec![Field::new("bytes", 3), Field::new("first", 9)]);

    // a plain 4CC lookup does not match the uuid box
    let by_type = DecoderRegistry::new().with_decoder(BoxKey::FourCC(FourCC::UUID), Box::new(ByteCount));
    assert!(by_type.decode_node(&mut src, node, &BoxRegistry::standard()).is_none());
}

#[test]
fn container_decoder_reads_its_preamble() {
    let mut dref = vec![0, 0, 0, 0];
    dref.extend_from_slice(&2u32.to_be_bytes());
    dref.extend(bx(b"url ", &[0, 0, 0, 1]));
    dref.extend(bx(b"url ", &[0, 0, 0, 1]));
    let data = bx(b"dref", &dref);

    let out = parse(Cursor::new(&data), data.len() as u64).unwrap();
    assert!(out.is_clean());
    let dref = &out.boxes[0];
    let mut src = Cursor::new(&data);
    let decoders = default_decoders();
    let fields = decoders
        .decode_node(&mut src, dref, &BoxRegistry::standard())
        .unwrap()
        .unwrap();
    assert!(fields.contains(&Field::new("entry_count", 2)));

    let url = &dref.children.as_ref().unwrap()[0];
    let fields = decoders
        .decode_node(&mut src, url, &BoxRegistry::standard())
        .unwrap()
        .unwrap();
    assert!(fields.contains(&Field::new("location", "(same file)")));
}

#[test]
fn short_payload_is_a_decode_error() {
    // mvhd needs far more than 2 bytes
    let data = concat(&[bx(b"mvhd", &[0, 0])]);
    let out = parse(Cursor::new(&data), data.len() as u64).unwrap();
    let mut src = Cursor::new(&data);
    let res = default_decoders()
        .decode_node(&mut src, &out.boxes[0], &BoxRegistry::standard())
        .unwrap();
    assert!(res.is_err());
}
