use crate::boxes::BoxHeader;
use serde::Serialize;
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated input at {offset:#x}: needed {needed} bytes")]
    TruncatedInput { offset: u64, needed: u64 },
    #[error("malformed header at {offset:#x}: {reason}")]
    MalformedHeader { offset: u64, reason: String },
    #[error(
        "invalid box size at {:#x}: '{}' resolves to {} bytes (header {} bytes, range ends at {:#x})",
        header.start, header.typ, header.size, header.header_size, limit
    )]
    InvalidSize { header: BoxHeader, limit: u64 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ParseError::Io(_) | ParseError::TruncatedInput { .. } => DiagnosticKind::TruncatedInput,
            ParseError::MalformedHeader { .. } => DiagnosticKind::MalformedHeader,
            ParseError::InvalidSize { .. } => DiagnosticKind::InvalidSize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    TruncatedInput,
    MalformedHeader,
    InvalidSize,
    OverrunError,
    MaxDepthExceeded,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A structural problem found while walking the box tree.
///
/// Diagnostics are emitted alongside the partial tree; the parse carries on
/// at the nearest enclosing range boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub offset: u64,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(offset: u64, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            offset,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}: {}", self.offset, self.kind, self.message)
    }
}
