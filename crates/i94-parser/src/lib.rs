//! Decoder for SAS7BDAT datasets.
//!
//! A SAS7BDAT file is a fixed-size header followed by fixed-size pages. Metadata
//! pages carry subheaders (row size, column names, column attributes, ...);
//! data and mix pages carry fixed-width rows. Compressed files store each row
//! as its own subheader on metadata pages, compressed with RLE or RDC.
//!
//! [`parse_sas7bdat`] turns the raw bytes into a polars [`DataFrame`]
//! (`Float64` for numeric columns, `String` for character columns).
//!
//! [`DataFrame`]: polars::prelude::DataFrame

mod compression;
mod decoder;
pub mod errors;
mod header;
pub mod model;
mod reader;
mod subheaders;

pub use decoder::parse_sas7bdat;
pub use errors::ParserError;
pub use model::{
    ColumnKind, Compression, Endianness, ReadOptions, SasColumn, SasDataset, SasMetadata,
    WordSize,
};

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
