use crate::boxes::{BoxClass, BoxHeader, BoxNode};
use crate::cursor::ByteCursor;
use crate::error::{Diagnostic, DiagnosticKind, ParseError, Result};
use crate::header::read_box_header;
use crate::known_boxes::{BoxRegistry, Preamble};
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, trace, warn};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Deepest nesting level whose boxes are parsed; top-level boxes are depth 0.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// How the walk over one byte range ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeState {
    /// Every byte of the range was covered by boxes.
    Done,
    /// A header could not be read; the tail of the range is unparsed.
    Truncated,
    /// A box claimed to extend past the end of the range.
    Overrun,
}

/// Boxes parsed from one range together with everything that went wrong in it,
/// including diagnostics from nested ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseOutcome {
    pub boxes: Vec<BoxNode>,
    pub diagnostics: Vec<Diagnostic>,
    pub state: RangeState,
}

impl ParseOutcome {
    fn new() -> Self {
        Self {
            boxes: Vec::new(),
            diagnostics: Vec::new(),
            state: RangeState::Done,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn report(&mut self, diag: Diagnostic) {
        warn!(offset = diag.offset, kind = %diag.kind, "{}", diag.message);
        self.diagnostics.push(diag);
    }
}

/// Recursive-descent walker over nested length-prefixed boxes.
pub struct TreeBuilder<'a, R> {
    cursor: ByteCursor<R>,
    registry: &'a BoxRegistry,
    options: ParseOptions,
}

impl<'a, R: Read + Seek> TreeBuilder<'a, R> {
    /// Build over the whole stream; the top-level range ends at the stream length.
    pub fn new(reader: R, registry: &'a BoxRegistry, options: ParseOptions) -> Result<Self> {
        Ok(Self::with_cursor(ByteCursor::new(reader)?, registry, options))
    }

    pub fn with_cursor(cursor: ByteCursor<R>, registry: &'a BoxRegistry, options: ParseOptions) -> Self {
        Self {
            cursor,
            registry,
            options,
        }
    }

    /// Parse the top-level range `[0, limit)` of the underlying cursor.
    pub fn parse_all(&mut self) -> Result<ParseOutcome> {
        let end = self.cursor.limit();
        self.parse_range(0, end, 0)
    }

    /// Parse the boxes in `[start, end)`, recursing into containers.
    ///
    /// Structural problems become diagnostics in the outcome; only I/O
    /// failures of the underlying stream are returned as errors.
    pub fn parse_range(&mut self, start: u64, end: u64, depth: usize) -> Result<ParseOutcome> {
        let mut out = ParseOutcome::new();
        self.cursor.seek_to(start)?;

        while self.cursor.position() < end {
            let pos = self.cursor.position();
            let header = match read_box_header(&mut self.cursor, end) {
                Ok(h) => h,
                Err(ParseError::Io(e)) => return Err(e.into()),
                Err(ParseError::InvalidSize { header, limit }) if header.size > limit - header.start => {
                    out.report(Diagnostic::new(
                        header.start,
                        DiagnosticKind::OverrunError,
                        format!(
                            "'{}' claims {} bytes, {} past the end of its enclosing range at {:#x}",
                            header.display_type(),
                            header.size,
                            header.size - (limit - header.start),
                            limit
                        ),
                    ));
                    // keep what fits, clamped to the boundary
                    let clamped = BoxHeader {
                        size: limit - header.start,
                        ..header
                    };
                    let node = self.build_node(clamped, depth, &mut out)?;
                    out.boxes.push(node);
                    out.state = RangeState::Overrun;
                    break;
                }
                Err(err) => {
                    out.report(Diagnostic::new(
                        pos,
                        err.kind(),
                        format!("{err}; {} bytes left unparsed up to {end:#x}", end - pos),
                    ));
                    out.state = RangeState::Truncated;
                    break;
                }
            };

            let stream_len = self.cursor.stream_len();
            if header.end() > stream_len && self.registry.classify(header.typ) != BoxClass::Container {
                out.report(Diagnostic::new(
                    header.start,
                    DiagnosticKind::TruncatedInput,
                    format!(
                        "'{}' ends at {:#x}, past the end of the stream at {stream_len:#x}",
                        header.display_type(),
                        header.end()
                    ),
                ));
                let node = self.build_node(header, depth, &mut out)?;
                out.boxes.push(node);
                out.state = RangeState::Truncated;
                break;
            }

            let node = self.build_node(header, depth, &mut out)?;
            // resync on the declared size, whatever the children consumed
            self.cursor.seek_to(node.end())?;
            out.boxes.push(node);
        }

        debug!(
            start,
            end,
            depth,
            boxes = out.boxes.len(),
            state = ?out.state,
            "range parsed"
        );
        Ok(out)
    }

    fn build_node(&mut self, header: BoxHeader, depth: usize, out: &mut ParseOutcome) -> Result<BoxNode> {
        let class = self.registry.classify(header.typ);
        trace!(
            offset = header.start,
            size = header.size,
            typ = %header.display_type(),
            %class,
            depth,
            "box"
        );

        let children = match class {
            BoxClass::Container => Some(self.parse_children(&header, depth, out)?),
            BoxClass::Leaf | BoxClass::Unknown => None,
        };
        Ok(BoxNode {
            header,
            class,
            children,
        })
    }

    fn parse_children(&mut self, header: &BoxHeader, depth: usize, out: &mut ParseOutcome) -> Result<Vec<BoxNode>> {
        if depth >= self.options.max_depth {
            out.report(Diagnostic::new(
                header.start,
                DiagnosticKind::MaxDepthExceeded,
                format!(
                    "'{}' would nest deeper than {} levels; children not parsed",
                    header.display_type(),
                    self.options.max_depth
                ),
            ));
            return Ok(Vec::new());
        }

        let preamble = self.preamble_len(header)?;
        let first = header.payload_start() + preamble;
        if first > header.end() {
            out.report(Diagnostic::new(
                header.start,
                DiagnosticKind::InvalidSize,
                format!(
                    "'{}' payload is {} bytes, shorter than its {preamble}-byte preamble",
                    header.display_type(),
                    header.size - header.header_size
                ),
            ));
            return Ok(Vec::new());
        }

        let inner = self.parse_range(first, header.end(), depth + 1)?;
        out.diagnostics.extend(inner.diagnostics);
        Ok(inner.boxes)
    }

    /// Resolve the container's preamble for this particular box.
    fn preamble_len(&mut self, header: &BoxHeader) -> Result<u64> {
        match self.registry.preamble(header.typ) {
            Preamble::Fixed(n) => Ok(n),
            Preamble::OptionalFullBox { first_child } => {
                // without version/flags, the first child's type sits at payload + 4
                let at = header.payload_start() + 4;
                if at + 4 > header.end() {
                    return Ok(4);
                }
                self.cursor.seek_to(at)?;
                match self.cursor.read_fourcc() {
                    Ok(cc) if cc == first_child => Ok(0),
                    Err(ParseError::Io(e)) => Err(ParseError::Io(e)),
                    Ok(_) | Err(_) => Ok(4),
                }
            }
        }
    }
}

/// Parse the first `len` bytes of `r` with the standard registry.
///
/// If `len` is larger than the stream, a header cut off by the real end, or a
/// leaf whose payload runs past it, is reported as `TruncatedInput`.
pub fn parse<R: Read + Seek>(r: R, len: u64) -> Result<ParseOutcome> {
    parse_with(r, len, &BoxRegistry::standard(), ParseOptions::default())
}

pub fn parse_with<R: Read + Seek>(
    r: R,
    len: u64,
    registry: &BoxRegistry,
    options: ParseOptions,
) -> Result<ParseOutcome> {
    let cursor = ByteCursor::with_limit(r, len)?;
    TreeBuilder::with_cursor(cursor, registry, options).parse_all()
}

/// Open and parse a file from disk.
pub fn parse_file(
    path: impl AsRef<Path>,
    registry: &BoxRegistry,
    options: ParseOptions,
) -> anyhow::Result<ParseOutcome> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let len = f.metadata()?.len();
    let outcome = parse_with(BufReader::new(f), len, registry, options)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(outcome)
}
