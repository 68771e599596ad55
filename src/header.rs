use crate::boxes::{BoxHeader, FourCC};
use crate::cursor::ByteCursor;
use crate::error::{ParseError, Result};
use std::io::{Read, Seek};

/// Read one box header at the cursor, bounded by `upper_bound`.
///
/// Layout: `size:u32 type:4cc [size64:u64 if size == 1] [uuid:16 if type == "uuid"]`.
/// A size of 0 means the box runs to `upper_bound`.
pub fn read_box_header<R: Read + Seek>(
    c: &mut ByteCursor<R>,
    upper_bound: u64,
) -> Result<BoxHeader> {
    let start = c.position();
    let avail = upper_bound.saturating_sub(start);

    require(start, avail, 8, "size and type")?;
    let declared_size = c.read_u32()?;
    let typ = c.read_fourcc()?;
    let mut header_size = 8u64;

    let mut large_size = None;
    if declared_size == 1 {
        require(start, avail, header_size + 8, "64-bit size")?;
        large_size = Some(c.read_u64()?);
        header_size += 8;
    }

    let mut uuid = None;
    if typ == FourCC::UUID {
        require(start, avail, header_size + 16, "extended type")?;
        uuid = Some(c.read_array::<16>()?);
        header_size += 16;
    }

    let size = match (declared_size, large_size) {
        (0, _) => avail,
        (1, Some(large)) => large,
        (n, _) => n as u64,
    };

    let header = BoxHeader {
        start,
        typ,
        declared_size,
        large_size,
        size,
        uuid,
        header_size,
    };

    if size < header_size || size > avail {
        return Err(ParseError::InvalidSize {
            header,
            limit: upper_bound,
        });
    }
    Ok(header)
}

fn require(start: u64, avail: u64, needed: u64, field: &str) -> Result<()> {
    if avail < needed {
        return Err(ParseError::MalformedHeader {
            offset: start,
            reason: format!("{field} needs {needed} header bytes, only {avail} left in range"),
        });
    }
    Ok(())
}

/// How a synthesized box records its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEncoding {
    /// 32-bit size field.
    Compact,
    /// size field == 1 followed by a 64-bit size.
    Large,
    /// size field == 0: box extends to the end of its enclosing range.
    ToEnd,
}

pub fn header_len(encoding: SizeEncoding, uuid: bool) -> u64 {
    let base = if encoding == SizeEncoding::Large { 16 } else { 8 };
    if uuid { base + 16 } else { base }
}

/// Append a complete box (header + payload) to `out`.
///
/// `uuid` is written only when `typ` is `uuid`. A compact size that would not
/// fit in 32 bits is written in the large form instead.
pub fn write_box(
    out: &mut Vec<u8>,
    typ: FourCC,
    uuid: Option<[u8; 16]>,
    encoding: SizeEncoding,
    payload: &[u8],
) {
    let ext = if typ == FourCC::UUID { Some(uuid.unwrap_or_default()) } else { None };
    let mut encoding = encoding;
    let mut total = header_len(encoding, ext.is_some()) + payload.len() as u64;
    if encoding == SizeEncoding::Compact && total > u32::MAX as u64 {
        encoding = SizeEncoding::Large;
        total += 8;
    }

    match encoding {
        SizeEncoding::Compact => out.extend_from_slice(&(total as u32).to_be_bytes()),
        SizeEncoding::Large | SizeEncoding::ToEnd => {
            let field: u32 = if encoding == SizeEncoding::Large { 1 } else { 0 };
            out.extend_from_slice(&field.to_be_bytes());
        }
    }
    out.extend_from_slice(&typ.0);
    if encoding == SizeEncoding::Large {
        out.extend_from_slice(&total.to_be_bytes());
    }
    if let Some(u) = ext {
        out.extend_from_slice(&u);
    }
    out.extend_from_slice(payload);
}
