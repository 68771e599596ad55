//! Indented text listing of a parsed box tree.
//!
//! One line per box, `type(size)@offset`, four spaces per nesting level.
//! Boxes missing from the registry are marked `[unknown]`.

use crate::boxes::{BoxClass, BoxNode};
use crate::decode::DecoderRegistry;
use crate::error::Diagnostic;
use crate::known_boxes::BoxRegistry;
use std::io::{self, Read, Seek, Write};

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Deepest level printed; deeper boxes are elided.
    pub max_depth: usize,
    /// Print the box's human-readable name after its position.
    pub names: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: usize::MAX,
            names: false,
        }
    }
}

/// Anything a payload can be re-read from.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

pub struct Renderer<'a> {
    registry: &'a BoxRegistry,
    options: RenderOptions,
}

impl<'a> Renderer<'a> {
    pub fn new(registry: &'a BoxRegistry, options: RenderOptions) -> Self {
        Self { registry, options }
    }

    pub fn write_tree<'b, W: Write>(
        &self,
        w: &mut W,
        boxes: impl IntoIterator<Item = &'b BoxNode>,
    ) -> io::Result<()> {
        for b in boxes {
            self.write_box(w, b, 0, &mut None)?;
        }
        Ok(())
    }

    /// Like [`Renderer::write_tree`], with decoded payload fields under each
    /// box that has a decoder. Payloads are re-read from `src`.
    pub fn write_tree_decoded<'b, W: Write>(
        &self,
        w: &mut W,
        boxes: impl IntoIterator<Item = &'b BoxNode>,
        src: &mut dyn ReadSeek,
        decoders: &DecoderRegistry,
    ) -> io::Result<()> {
        let mut ctx = Some((src, decoders));
        for b in boxes {
            self.write_box(w, b, 0, &mut ctx)?;
        }
        Ok(())
    }

    fn write_box<W: Write>(
        &self,
        w: &mut W,
        b: &BoxNode,
        depth: usize,
        ctx: &mut Option<(&mut dyn ReadSeek, &DecoderRegistry)>,
    ) -> io::Result<()> {
        if depth > self.options.max_depth {
            return Ok(());
        }
        let indent = INDENT.repeat(depth);
        let hdr = &b.header;
        write!(w, "{indent}{}({})@{}", hdr.display_type(), hdr.size, hdr.start)?;
        if b.class == BoxClass::Unknown {
            write!(w, " [unknown]")?;
        }
        if self.options.names && b.class != BoxClass::Unknown {
            write!(w, "  {}", self.registry.full_name(hdr.typ))?;
        }
        writeln!(w)?;

        if let Some((src, decoders)) = ctx.as_mut() {
            match decoders.decode_node(src, b, self.registry) {
                Some(Ok(fields)) => {
                    for f in fields {
                        writeln!(w, "{indent}{INDENT}- {} = {}", f.name, f.value)?;
                    }
                }
                Some(Err(e)) => writeln!(w, "{indent}{INDENT}- [decode error: {e}]")?,
                None => {}
            }
        }

        if let Some(children) = &b.children {
            for c in children {
                self.write_box(w, c, depth + 1, ctx)?;
            }
        }
        Ok(())
    }
}

pub fn write_diagnostics<W: Write>(w: &mut W, diagnostics: &[Diagnostic]) -> io::Result<()> {
    for d in diagnostics {
        writeln!(w, "!! {d}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::default_decoders;
    use crate::parser::parse;
    use std::io::Cursor;

    fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
        v.extend_from_slice(typ);
        v.extend_from_slice(payload);
        v
    }

    fn sample() -> Vec<u8> {
        let mut ftyp = b"isom".to_vec();
        ftyp.extend_from_slice(&0u32.to_be_bytes());
        let mut data = bx(b"ftyp", &ftyp);
        data.extend(bx(b"moov", &bx(b"zzzz", &[1, 2, 3, 4])));
        data
    }

    fn render(data: &[u8], options: RenderOptions) -> String {
        let out = parse(Cursor::new(data), data.len() as u64).unwrap();
        let reg = BoxRegistry::standard();
        let mut buf = Vec::new();
        Renderer::new(&reg, options)
            .write_tree(&mut buf, &out.boxes)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn indented_listing() {
        let text = render(&sample(), RenderOptions::default());
        assert_eq!(text, "ftyp(16)@0\nmoov(20)@16\n    zzzz(12)@24 [unknown]\n");
    }

    #[test]
    fn names_and_depth_cutoff() {
        let text = render(
            &sample(),
            RenderOptions {
                max_depth: 0,
                names: true,
            },
        );
        assert_eq!(text, "ftyp(16)@0  File Type Box\nmoov(20)@16  Movie Box\n");
    }

    #[test]
    fn decoded_fields_follow_their_box() {
        let data = sample();
        let out = parse(Cursor::new(&data), data.len() as u64).unwrap();
        let reg = BoxRegistry::standard();
        let mut src = Cursor::new(&data);
        let mut buf = Vec::new();
        Renderer::new(&reg, RenderOptions::default())
            .write_tree_decoded(&mut buf, &out.boxes, &mut src, &default_decoders())
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("ftyp(16)@0\n    - major_brand = isom\n    - minor_version = 0\n"));
        assert!(text.contains("    zzzz(12)@24 [unknown]\n"));
    }

    #[test]
    fn diagnostics_lines() {
        let diags = vec![Diagnostic::new(
            8,
            crate::error::DiagnosticKind::MalformedHeader,
            "short",
        )];
        let mut buf = Vec::new();
        write_diagnostics(&mut buf, &diags).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "!! 0x8: MalformedHeader: short\n");
    }
}
