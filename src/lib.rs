pub mod boxes;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod header;
pub mod known_boxes;
pub mod parser;
pub mod render;

pub use boxes::{BoxClass, BoxHeader, BoxKey, BoxNode, FourCC};
pub use cursor::ByteCursor;
pub use decode::{BoxDecoder, DecoderRegistry, Field, default_decoders};
pub use error::{Diagnostic, DiagnosticKind, ParseError};
pub use header::{SizeEncoding, read_box_header, write_box};
pub use known_boxes::{BoxRegistry, BoxSpec, Preamble};
pub use parser::{ParseOptions, ParseOutcome, RangeState, TreeBuilder, parse, parse_file, parse_with};
pub use render::{RenderOptions, Renderer, write_diagnostics};
