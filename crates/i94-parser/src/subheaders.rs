use crate::errors::ParserError;
use crate::header::SasHeader;
use crate::model::{decode_text, ColumnKind, Compression, SasColumn, SasMetadata, WordSize};
use crate::reader::ByteView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubheaderKind {
    RowSize,
    ColumnSize,
    SubheaderCounts,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    FormatAndLabel,
    ColumnList,
}

const SIGNATURES: &[(&[u8], SubheaderKind)] = &[
    (b"\xF7\xF7\xF7\xF7", SubheaderKind::RowSize),
    (b"\x00\x00\x00\x00\xF7\xF7\xF7\xF7", SubheaderKind::RowSize),
    (b"\xF7\xF7\xF7\xF7\x00\x00\x00\x00", SubheaderKind::RowSize),
    (b"\xF7\xF7\xF7\xF7\xFF\xFF\xFB\xFE", SubheaderKind::RowSize),
    (b"\xF6\xF6\xF6\xF6", SubheaderKind::ColumnSize),
    (b"\x00\x00\x00\x00\xF6\xF6\xF6\xF6", SubheaderKind::ColumnSize),
    (b"\xF6\xF6\xF6\xF6\x00\x00\x00\x00", SubheaderKind::ColumnSize),
    (b"\xF6\xF6\xF6\xF6\xFF\xFF\xFB\xFE", SubheaderKind::ColumnSize),
    (b"\x00\xFC\xFF\xFF", SubheaderKind::SubheaderCounts),
    (b"\xFF\xFF\xFC\x00", SubheaderKind::SubheaderCounts),
    (b"\x00\xFC\xFF\xFF\xFF\xFF\xFF\xFF", SubheaderKind::SubheaderCounts),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFC\x00", SubheaderKind::SubheaderCounts),
    (b"\xFD\xFF\xFF\xFF", SubheaderKind::ColumnText),
    (b"\xFF\xFF\xFF\xFD", SubheaderKind::ColumnText),
    (b"\xFD\xFF\xFF\xFF\xFF\xFF\xFF\xFF", SubheaderKind::ColumnText),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFD", SubheaderKind::ColumnText),
    (b"\xFF\xFF\xFF\xFF", SubheaderKind::ColumnName),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF", SubheaderKind::ColumnName),
    (b"\xFC\xFF\xFF\xFF", SubheaderKind::ColumnAttributes),
    (b"\xFF\xFF\xFF\xFC", SubheaderKind::ColumnAttributes),
    (b"\xFC\xFF\xFF\xFF\xFF\xFF\xFF\xFF", SubheaderKind::ColumnAttributes),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFC", SubheaderKind::ColumnAttributes),
    (b"\xFE\xFB\xFF\xFF", SubheaderKind::FormatAndLabel),
    (b"\xFF\xFF\xFB\xFE", SubheaderKind::FormatAndLabel),
    (b"\xFE\xFB\xFF\xFF\xFF\xFF\xFF\xFF", SubheaderKind::FormatAndLabel),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFB\xFE", SubheaderKind::FormatAndLabel),
    (b"\xFE\xFF\xFF\xFF", SubheaderKind::ColumnList),
    (b"\xFF\xFF\xFF\xFE", SubheaderKind::ColumnList),
    (b"\xFE\xFF\xFF\xFF\xFF\xFF\xFF\xFF", SubheaderKind::ColumnList),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFE", SubheaderKind::ColumnList),
];

pub(crate) fn classify(signature: &[u8]) -> Option<SubheaderKind> {
    SIGNATURES
        .iter()
        .find(|(known, _)| *known == signature)
        .map(|(_, kind)| *kind)
}

const RLE_LITERAL: &[u8] = b"SASYZCRL";
const RDC_LITERAL: &[u8] = b"SASYZCR2";

#[derive(Debug, Clone, Copy)]
struct ColumnAttributes {
    offset: usize,
    width: usize,
    kind: ColumnKind,
}

/// Accumulates the metadata subheaders spread over the leading pages.
#[derive(Debug)]
pub(crate) struct MetadataBuilder {
    word_size: WordSize,
    row_length: Option<usize>,
    row_count: Option<usize>,
    mix_page_row_count: usize,
    column_count: Option<usize>,
    text_blocks: Vec<Vec<u8>>,
    names: Vec<String>,
    attributes: Vec<ColumnAttributes>,
    compression: Compression,
}

impl MetadataBuilder {
    pub fn new(word_size: WordSize) -> Self {
        Self {
            word_size,
            row_length: None,
            row_count: None,
            mix_page_row_count: 0,
            column_count: None,
            text_blocks: Vec::new(),
            names: Vec::new(),
            attributes: Vec::new(),
            compression: Compression::None,
        }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn is_complete(&self) -> bool {
        self.row_length.is_some()
            && self.row_count.is_some()
            && self.column_count.is_some_and(|count| {
                count > 0 && self.names.len() >= count && self.attributes.len() >= count
            })
    }

    pub fn process(
        &mut self,
        kind: SubheaderKind,
        page: &ByteView<'_>,
        offset: usize,
        length: usize,
    ) -> Result<(), ParserError> {
        match kind {
            SubheaderKind::RowSize => self.row_size(page, offset),
            SubheaderKind::ColumnSize => self.column_size(page, offset),
            SubheaderKind::ColumnText => self.column_text(page, offset),
            SubheaderKind::ColumnName => self.column_names(page, offset, length),
            SubheaderKind::ColumnAttributes => self.column_attributes(page, offset, length),
            // Counts, formats/labels and column lists carry nothing the decoder needs.
            SubheaderKind::SubheaderCounts
            | SubheaderKind::FormatAndLabel
            | SubheaderKind::ColumnList => Ok(()),
        }
    }

    fn row_size(&mut self, page: &ByteView<'_>, offset: usize) -> Result<(), ParserError> {
        let int_len = self.word_size.int_len();
        self.row_length = Some(page.int(offset + 5 * int_len, int_len)?);
        self.row_count = Some(page.int(offset + 6 * int_len, int_len)?);
        self.mix_page_row_count = page.int(offset + 15 * int_len, int_len)?;
        Ok(())
    }

    fn column_size(&mut self, page: &ByteView<'_>, offset: usize) -> Result<(), ParserError> {
        let int_len = self.word_size.int_len();
        self.column_count = Some(page.int(offset + int_len, int_len)?);
        Ok(())
    }

    fn column_text(&mut self, page: &ByteView<'_>, offset: usize) -> Result<(), ParserError> {
        let block_offset = offset + self.word_size.int_len();
        let block_len = usize::from(page.u16(block_offset)?);
        let block = page.slice(block_offset, block_len)?;

        if self.text_blocks.is_empty() {
            if contains(block, RLE_LITERAL) {
                self.compression = Compression::Rle;
            } else if contains(block, RDC_LITERAL) {
                self.compression = Compression::Rdc;
            }
        }

        self.text_blocks.push(block.to_vec());
        Ok(())
    }

    fn column_names(
        &mut self,
        page: &ByteView<'_>,
        offset: usize,
        length: usize,
    ) -> Result<(), ParserError> {
        let int_len = self.word_size.int_len();
        let count = length.saturating_sub(2 * int_len + 12) / 8;
        let base = offset + int_len;

        for idx in 0..count {
            let pointer = base + 8 * (idx + 1);
            let block_idx = usize::from(page.u16(pointer)?);
            let name_offset = usize::from(page.u16(pointer + 2)?);
            let name_len = usize::from(page.u16(pointer + 4)?);

            let block = self.text_blocks.get(block_idx).ok_or_else(|| {
                ParserError::IncompleteMetadata(format!(
                    "column name {} refers to missing text block {block_idx}",
                    self.names.len()
                ))
            })?;
            let raw = block
                .get(name_offset..name_offset + name_len)
                .ok_or(ParserError::Truncated {
                    offset: name_offset,
                    len: name_len,
                    available: block.len(),
                })?;
            self.names.push(decode_text(raw));
        }
        Ok(())
    }

    fn column_attributes(
        &mut self,
        page: &ByteView<'_>,
        offset: usize,
        length: usize,
    ) -> Result<(), ParserError> {
        let int_len = self.word_size.int_len();
        let stride = int_len + 8;
        let count = length.saturating_sub(2 * int_len + 12) / stride;

        for idx in 0..count {
            let data_offset = page.int(offset + int_len + 8 + idx * stride, int_len)?;
            let width = page.int(offset + 2 * int_len + 8 + idx * stride, 4)?;
            let kind = match page.u8(offset + 2 * int_len + 14 + idx * stride)? {
                1 => ColumnKind::Numeric,
                _ => ColumnKind::Character,
            };
            self.attributes.push(ColumnAttributes {
                offset: data_offset,
                width,
                kind,
            });
        }
        Ok(())
    }

    pub fn finish(self, header: &SasHeader) -> Result<SasMetadata, ParserError> {
        let row_length = self
            .row_length
            .ok_or_else(|| ParserError::IncompleteMetadata("row size subheader missing".into()))?;
        let row_count = self
            .row_count
            .ok_or_else(|| ParserError::IncompleteMetadata("row size subheader missing".into()))?;
        let column_count = self.column_count.ok_or_else(|| {
            ParserError::IncompleteMetadata("column size subheader missing".into())
        })?;

        if self.names.len() < column_count || self.attributes.len() < column_count {
            return Err(ParserError::IncompleteMetadata(format!(
                "expected {column_count} columns, found {} names and {} attribute entries",
                self.names.len(),
                self.attributes.len()
            )));
        }

        let mut columns = Vec::with_capacity(column_count);
        for (name, attributes) in self
            .names
            .into_iter()
            .zip(self.attributes)
            .take(column_count)
        {
            if attributes.offset + attributes.width > row_length {
                return Err(ParserError::Column {
                    column: name,
                    message: format!(
                        "value at offset {} width {} exceeds row length {row_length}",
                        attributes.offset, attributes.width
                    ),
                });
            }
            if attributes.kind == ColumnKind::Numeric && attributes.width > 8 {
                return Err(ParserError::Column {
                    column: name,
                    message: format!("numeric width {} exceeds 8 bytes", attributes.width),
                });
            }
            columns.push(SasColumn {
                name,
                kind: attributes.kind,
                offset: attributes.offset,
                width: attributes.width,
            });
        }

        Ok(SasMetadata {
            dataset_name: header.dataset_name.clone(),
            word_size: header.word_size,
            endianness: header.endianness,
            encoding: header.encoding,
            page_length: header.page_length,
            page_count: header.page_count,
            row_length,
            row_count,
            mix_page_row_count: self.mix_page_row_count,
            compression: self.compression,
            columns,
        })
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
