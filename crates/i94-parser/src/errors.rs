use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("not a SAS7BDAT file: magic number mismatch")]
    BadMagic,

    #[error("input truncated: needed {len} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("page {page}: unknown page type {page_type:#06x}")]
    UnknownPageType { page: usize, page_type: u16 },

    #[error("page {page}: unrecognized subheader signature {signature:02x?}")]
    UnknownSubheader { page: usize, signature: Vec<u8> },

    #[error("incomplete metadata: {0}")]
    IncompleteMetadata(String),

    #[error("column {column}: {message}")]
    Column { column: String, message: String },

    #[error("{scheme} decompression failed: {message}")]
    Decompression {
        scheme: &'static str,
        message: String,
    },

    #[error("file declares {expected} rows but only {found} could be read")]
    MissingRows { expected: usize, found: usize },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}
