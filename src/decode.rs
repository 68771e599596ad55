use crate::boxes::{BoxClass, BoxHeader, BoxKey, BoxNode, FourCC};
use crate::known_boxes::BoxRegistry;
use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// One decoded payload field, kept in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub value: String,
}

impl Field {
    pub fn new(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }
}

/// Trait for box payload decoders.
///
/// `r` yields exactly the payload bytes after the box header (for containers,
/// only the fixed preamble before the first child).
pub trait BoxDecoder: Send + Sync {
    fn decode(&self, r: &mut dyn Read, hdr: &BoxHeader) -> anyhow::Result<Vec<Field>>;
}

/// Decoders keyed by `BoxKey` (4CC or UUID).
pub struct DecoderRegistry {
    map: HashMap<BoxKey, Box<dyn BoxDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn with_decoder(mut self, key: BoxKey, dec: Box<dyn BoxDecoder>) -> Self {
        self.map.insert(key, dec);
        self
    }

    /// Decode a payload with the decoder registered for `key`, if any.
    pub fn decode(
        &self,
        key: &BoxKey,
        r: &mut dyn Read,
        hdr: &BoxHeader,
    ) -> Option<anyhow::Result<Vec<Field>>> {
        self.map.get(key).map(|d| d.decode(r, hdr))
    }

    /// Re-read `node`'s payload from `src` and decode it.
    pub fn decode_node<R: Read + Seek + ?Sized>(
        &self,
        src: &mut R,
        node: &BoxNode,
        boxes: &BoxRegistry,
    ) -> Option<anyhow::Result<Vec<Field>>> {
        let hdr = &node.header;
        let dec = self.map.get(&BoxKey::from(hdr))?;

        let len = match node.class {
            // an optional preamble was resolved by the walk; the first child shows its length
            BoxClass::Container => match node.children.as_deref() {
                Some([first, ..]) => first.start() - hdr.payload_start(),
                _ => boxes.children_offset(hdr.typ).min(hdr.size - hdr.header_size),
            },
            BoxClass::Leaf | BoxClass::Unknown => hdr.size - hdr.header_size,
        };
        if let Err(e) = src.seek(SeekFrom::Start(hdr.payload_start())) {
            return Some(Err(e.into()));
        }
        let mut limited = src.take(len);
        Some(dec.decode(&mut limited, hdr))
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------- Helpers ----------

fn read_all(r: &mut dyn Read) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

/// FullBox prefix: 8-bit version, 24-bit flags.
fn read_full_box(cur: &mut Cursor<&[u8]>, out: &mut Vec<Field>) -> anyhow::Result<(u8, u32)> {
    let version = cur.read_u8()?;
    let flags = cur.read_u24::<BigEndian>()?;
    out.push(Field::new("version", version));
    out.push(Field::new("flags", format!("{flags:#x}")));
    Ok((version, flags))
}

/// creation, modification: 64-bit in version 1, 32-bit otherwise.
fn read_times(cur: &mut Cursor<&[u8]>, version: u8) -> anyhow::Result<(u64, u64)> {
    if version == 1 {
        Ok((cur.read_u64::<BigEndian>()?, cur.read_u64::<BigEndian>()?))
    } else {
        Ok((cur.read_u32::<BigEndian>()? as u64, cur.read_u32::<BigEndian>()? as u64))
    }
}

fn read_versioned(cur: &mut Cursor<&[u8]>, version: u8) -> anyhow::Result<u64> {
    Ok(if version == 1 {
        cur.read_u64::<BigEndian>()?
    } else {
        cur.read_u32::<BigEndian>()? as u64
    })
}

fn read_matrix(cur: &mut Cursor<&[u8]>) -> anyhow::Result<String> {
    let mut m = [0i32; 9];
    cur.read_i32_into::<BigEndian>(&mut m)?;
    Ok(format!("{m:?}"))
}

fn skip(cur: &mut Cursor<&[u8]>, n: u64) -> anyhow::Result<()> {
    let to = cur.position() + n;
    if to > cur.get_ref().len() as u64 {
        anyhow::bail!("payload ends before {n} reserved bytes at {}", cur.position());
    }
    cur.set_position(to);
    Ok(())
}

fn fourcc_str(cur: &mut Cursor<&[u8]>) -> anyhow::Result<String> {
    let mut b = [0u8; 4];
    cur.read_exact(&mut b)?;
    Ok(FourCC(b).to_string())
}

/// NUL-terminated UTF-8; a missing terminator takes the rest of the payload.
fn cstring(cur: &mut Cursor<&[u8]>) -> String {
    let buf = *cur.get_ref();
    let start = (cur.position() as usize).min(buf.len());
    let rest = &buf[start..];
    let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    cur.set_position((start + (len + 1).min(rest.len())) as u64);
    String::from_utf8_lossy(&rest[..len]).into_owned()
}

fn lang_from_u16(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

fn fixed_16_16(v: i32) -> String {
    format!("{}", v as f64 / 65536.0)
}

// ---------- Decoders ----------

// ftyp: major + minor + compatible brands
pub struct FtypDecoder;

impl BoxDecoder for FtypDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let major = fourcc_str(&mut cur)?;
        let minor = cur.read_u32::<BigEndian>()?;
        let brands: Vec<String> = buf[8..]
            .chunks_exact(4)
            .map(|c| FourCC([c[0], c[1], c[2], c[3]]).to_string())
            .collect();
        Ok(vec![
            Field::new("major_brand", major),
            Field::new("minor_version", minor),
            Field::new("compatible_brands", brands.join(",")),
        ])
    }
}

pub struct MvhdDecoder;

impl BoxDecoder for MvhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        let (version, _) = read_full_box(&mut cur, &mut out)?;

        let (creation, modification) = read_times(&mut cur, version)?;
        let timescale = cur.read_u32::<BigEndian>()?;
        let duration = read_versioned(&mut cur, version)?;
        let rate = cur.read_u32::<BigEndian>()?;
        let volume = cur.read_u16::<BigEndian>()?;
        skip(&mut cur, 10)?;
        let matrix = read_matrix(&mut cur)?;
        skip(&mut cur, 24)?;
        let next_track_id = cur.read_u32::<BigEndian>()?;

        out.extend([
            Field::new("creation_time", creation),
            Field::new("modification_time", modification),
            Field::new("timescale", timescale),
            Field::new("duration", duration),
            Field::new("rate", format!("{rate:#010x}")),
            Field::new("volume", format!("{volume:#06x}")),
            Field::new("matrix", matrix),
            Field::new("next_track_id", next_track_id),
        ]);
        Ok(out)
    }
}

pub struct TkhdDecoder;

impl BoxDecoder for TkhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        let (version, _) = read_full_box(&mut cur, &mut out)?;

        let (creation, modification) = read_times(&mut cur, version)?;
        let track_id = cur.read_u32::<BigEndian>()?;
        skip(&mut cur, 4)?;
        let duration = read_versioned(&mut cur, version)?;
        skip(&mut cur, 8)?;
        let layer = cur.read_i16::<BigEndian>()?;
        let alternate_group = cur.read_u16::<BigEndian>()?;
        let volume = cur.read_i16::<BigEndian>()?;
        skip(&mut cur, 2)?;
        let matrix = read_matrix(&mut cur)?;
        let width = cur.read_i32::<BigEndian>()?;
        let height = cur.read_i32::<BigEndian>()?;

        out.extend([
            Field::new("creation_time", creation),
            Field::new("modification_time", modification),
            Field::new("track_id", track_id),
            Field::new("duration", duration),
            Field::new("layer", layer),
            Field::new("alternate_group", alternate_group),
            Field::new("volume", format!("{volume:#06x}")),
            Field::new("matrix", matrix),
            Field::new("width", fixed_16_16(width)),
            Field::new("height", fixed_16_16(height)),
        ]);
        Ok(out)
    }
}

pub struct MdhdDecoder;

impl BoxDecoder for MdhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        let (version, _) = read_full_box(&mut cur, &mut out)?;

        let (creation, modification) = read_times(&mut cur, version)?;
        let timescale = cur.read_u32::<BigEndian>()?;
        let duration = read_versioned(&mut cur, version)?;
        let language = cur.read_u16::<BigEndian>()?;

        out.extend([
            Field::new("creation_time", creation),
            Field::new("modification_time", modification),
            Field::new("timescale", timescale),
            Field::new("duration", duration),
            Field::new("language", lang_from_u16(language)),
        ]);
        Ok(out)
    }
}

pub struct HdlrDecoder;

impl BoxDecoder for HdlrDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        read_full_box(&mut cur, &mut out)?;

        skip(&mut cur, 4)?; // pre_defined
        let handler_type = fourcc_str(&mut cur)?;
        skip(&mut cur, 12)?;

        // The name runs to the end of the box. Some writers emit a
        // length-prefixed string with no terminator instead of a C string.
        let mut name = &buf[cur.position() as usize..];
        if let Some((&len, rest)) = name.split_first() {
            if len != 0 && len as usize == rest.len() {
                name = rest;
            }
        }
        let name = String::from_utf8_lossy(name)
            .trim_end_matches('\0')
            .to_string();

        out.push(Field::new("handler_type", handler_type));
        out.push(Field::new("name", name));
        Ok(out)
    }
}

pub struct VmhdDecoder;

impl BoxDecoder for VmhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        read_full_box(&mut cur, &mut out)?;

        let graphics_mode = cur.read_u16::<BigEndian>()?;
        let mut opcolor = [0u16; 3];
        cur.read_u16_into::<BigEndian>(&mut opcolor)?;
        out.push(Field::new("graphics_mode", graphics_mode));
        out.push(Field::new("opcolor", format!("{opcolor:?}")));
        Ok(out)
    }
}

pub struct SmhdDecoder;

impl BoxDecoder for SmhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        read_full_box(&mut cur, &mut out)?;

        // 8.8 fixed point
        let balance = cur.read_i16::<BigEndian>()?;
        out.push(Field::new(
            "balance",
            format!("{balance} ({:.3})", balance as f64 / 256.0),
        ));
        Ok(out)
    }
}

pub struct HmhdDecoder;

impl BoxDecoder for HmhdDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        read_full_box(&mut cur, &mut out)?;

        out.push(Field::new("max_pdu_size", cur.read_u16::<BigEndian>()?));
        out.push(Field::new("avg_pdu_size", cur.read_u16::<BigEndian>()?));
        out.push(Field::new("max_bitrate", cur.read_u32::<BigEndian>()?));
        out.push(Field::new("avg_bitrate", cur.read_u32::<BigEndian>()?));
        Ok(out)
    }
}

/// Version/flags only: `nmhd`, and the preamble of `dref`/`stsd`-style containers.
pub struct FullBoxDecoder {
    /// Whether a 32-bit entry count follows version/flags.
    pub entry_count: bool,
}

impl BoxDecoder for FullBoxDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        read_full_box(&mut cur, &mut out)?;
        if self.entry_count {
            out.push(Field::new("entry_count", cur.read_u32::<BigEndian>()?));
        }
        Ok(out)
    }
}

pub struct ElstDecoder;

impl BoxDecoder for ElstDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        let (version, _) = read_full_box(&mut cur, &mut out)?;

        let entry_count = cur.read_u32::<BigEndian>()?;
        out.push(Field::new("entry_count", entry_count));
        for _ in 0..entry_count {
            let (duration, media_time) = if version == 1 {
                (cur.read_u64::<BigEndian>()?, cur.read_i64::<BigEndian>()?)
            } else {
                (
                    cur.read_u32::<BigEndian>()? as u64,
                    cur.read_i32::<BigEndian>()? as i64,
                )
            };
            let rate_int = cur.read_i16::<BigEndian>()?;
            let rate_frac = cur.read_i16::<BigEndian>()?;
            out.push(Field::new(
                "entry",
                format!("duration={duration} media_time={media_time} rate={rate_int}.{rate_frac}"),
            ));
        }
        Ok(out)
    }
}

pub struct UrlDecoder;

impl BoxDecoder for UrlDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        let (_, flags) = read_full_box(&mut cur, &mut out)?;

        // flag 0x1: media data is in the same file, no location string
        if flags & 0x1 != 0 {
            out.push(Field::new("location", "(same file)"));
        } else {
            out.push(Field::new("location", cstring(&mut cur)));
        }
        Ok(out)
    }
}

pub struct UrnDecoder;

impl BoxDecoder for UrnDecoder {
    fn decode(&self, r: &mut dyn Read, _hdr: &BoxHeader) -> anyhow::Result<Vec<Field>> {
        let buf = read_all(r)?;
        let mut cur = Cursor::new(&buf[..]);
        let mut out = Vec::new();
        read_full_box(&mut cur, &mut out)?;

        out.push(Field::new("name", cstring(&mut cur)));
        out.push(Field::new("location", cstring(&mut cur)));
        Ok(out)
    }
}

/// The decoders shipped with the crate.
pub fn default_decoders() -> DecoderRegistry {
    let key = |cc: &[u8; 4]| BoxKey::FourCC(FourCC(*cc));
    DecoderRegistry::new()
        .with_decoder(key(b"ftyp"), Box::new(FtypDecoder))
        .with_decoder(key(b"styp"), Box::new(FtypDecoder))
        .with_decoder(key(b"mvhd"), Box::new(MvhdDecoder))
        .with_decoder(key(b"tkhd"), Box::new(TkhdDecoder))
        .with_decoder(key(b"mdhd"), Box::new(MdhdDecoder))
        .with_decoder(key(b"hdlr"), Box::new(HdlrDecoder))
        .with_decoder(key(b"vmhd"), Box::new(VmhdDecoder))
        .with_decoder(key(b"smhd"), Box::new(SmhdDecoder))
        .with_decoder(key(b"hmhd"), Box::new(HmhdDecoder))
        .with_decoder(key(b"nmhd"), Box::new(FullBoxDecoder { entry_count: false }))
        .with_decoder(key(b"dref"), Box::new(FullBoxDecoder { entry_count: true }))
        .with_decoder(key(b"stsd"), Box::new(FullBoxDecoder { entry_count: true }))
        .with_decoder(key(b"elst"), Box::new(ElstDecoder))
        .with_decoder(key(b"url "), Box::new(UrlDecoder))
        .with_decoder(key(b"urn "), Box::new(UrnDecoder))
}
