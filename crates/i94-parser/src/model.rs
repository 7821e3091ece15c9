use std::fmt;

use polars::prelude::DataFrame;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    Little,
    Big,
}

/// Integer width used for offsets and counts inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WordSize {
    #[serde(rename = "32-bit")]
    Bits32,
    #[serde(rename = "64-bit")]
    Bits64,
}

impl WordSize {
    pub fn int_len(self) -> usize {
        match self {
            WordSize::Bits32 => 4,
            WordSize::Bits64 => 8,
        }
    }

    /// Offset of the page header within each page.
    pub(crate) fn page_bit_offset(self) -> usize {
        match self {
            WordSize::Bits32 => 16,
            WordSize::Bits64 => 32,
        }
    }

    pub(crate) fn subheader_pointer_len(self) -> usize {
        match self {
            WordSize::Bits32 => 12,
            WordSize::Bits64 => 24,
        }
    }
}

impl fmt::Display for WordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordSize::Bits32 => f.write_str("32-bit"),
            WordSize::Bits64 => f.write_str("64-bit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
    /// `SASYZCRL` run-length encoding.
    Rle,
    /// `SASYZCR2` Ross data compression.
    Rdc,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Rle => "rle",
            Compression::Rdc => "rdc",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Character,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Character => "character",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SasColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// Byte offset of the value within a row.
    pub offset: usize,
    /// Stored width in bytes.
    pub width: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SasMetadata {
    pub dataset_name: String,
    pub word_size: WordSize,
    pub endianness: Endianness,
    pub encoding: u8,
    pub page_length: usize,
    pub page_count: usize,
    pub row_length: usize,
    pub row_count: usize,
    pub mix_page_row_count: usize,
    pub compression: Compression,
    pub columns: Vec<SasColumn>,
}

impl SasMetadata {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Stop decoding after this many rows.
    pub row_limit: Option<usize>,
}

impl ReadOptions {
    pub fn with_row_limit(limit: usize) -> Self {
        Self {
            row_limit: Some(limit),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SasDataset {
    pub metadata: SasMetadata,
    pub df: DataFrame,
}

/// Decodes SAS character data: trailing blanks and NUL padding are dropped,
/// invalid UTF-8 falls back to Latin-1.
pub(crate) fn decode_text(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|byte| *byte != 0 && *byte != b' ')
        .map_or(0, |idx| idx + 1);
    let trimmed = &raw[..end];
    match std::str::from_utf8(trimmed) {
        Ok(text) => text.to_string(),
        Err(_) => trimmed.iter().map(|byte| char::from(*byte)).collect(),
    }
}
