use std::{io, path::PathBuf};

use thiserror::Error;

/// Structural violations found while reading a single metrics file.  Parsing
/// of that file is aborted; no partial [ParsedFile](crate::codec::ParsedFile)
/// is returned.  Line numbers are 1-based.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuralError {
    #[error("{}:{}: consecutive class header lines", .path.display(), .line)]
    ConsecutiveClassHeaders { path: PathBuf, line: usize },

    #[error("{}:{}: header value before any class header", .path.display(), .line)]
    ValueWithoutClass { path: PathBuf, line: usize },

    #[error("{}:{}: unexpected line in metrics file: {}", .path.display(), .line, .content)]
    UnexpectedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("{}:{}: malformed block: {}", .path.display(), .line, .detail)]
    MalformedBlock {
        path: PathBuf,
        line: usize,
        detail: String,
    },
}

/// Failures from reading and tokenizing a metrics file.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("Error opening {}: {}", .path.display(), .source)]
    Open { path: PathBuf, source: io::Error },

    #[error("Error reading {} at line {}: {}", .path.display(), .line, .source)]
    Read {
        path: PathBuf,
        line: usize,
        source: io::Error,
    },
}

/// Failures from matching a parsed file against the variant registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{}: no registered metrics variant matches this file", .path.display())]
    UnrecognizedFormat { path: PathBuf },

    #[error("{}: ambiguous match, candidates: {}", .path.display(), .variants.join(", "))]
    AmbiguousMatch {
        path: PathBuf,
        variants: Vec<&'static str>,
    },
}
