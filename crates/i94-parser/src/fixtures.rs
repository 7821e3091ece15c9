//! In-memory SAS7BDAT writer for tests.
//!
//! Produces the part of the format the decoder reads: a header, one
//! metadata page (optionally a mix page carrying the first rows), then data
//! pages. Compressed files store every row as a subheader on metadata pages
//! instead. Every layout the decoder accepts can be built: 32- or 64-bit,
//! little- or big-endian, uncompressed, RLE or RDC.

use crate::header::MAGIC;
use crate::model::{ColumnKind, Compression, Endianness, WordSize};

const HEADER_LEN: usize = 1024;
const DEFAULT_PAGE_LEN: usize = 4096;

const PAGE_META: u16 = 0x0000;
const PAGE_DATA: u16 = 0x0100;
const PAGE_MIX: u16 = 0x0200;

const ROW_SIZE_SIGNATURE: u64 = 0xF7F7_F7F7;
const COLUMN_SIZE_SIGNATURE: u64 = 0xF6F6_F6F6;
const COLUMN_TEXT_SIGNATURE: u64 = 0xFFFF_FFFF_FFFF_FFFD;
const COLUMN_NAME_SIGNATURE: u64 = 0xFFFF_FFFF_FFFF_FFFF;
const COLUMN_ATTRIBUTES_SIGNATURE: u64 = 0xFFFF_FFFF_FFFF_FFFC;

const TEXT_LITERAL_OFFSET: usize = 16;
const TEXT_NAMES_OFFSET: usize = 24;

/// One cell of a fixture row. Empty text and `Number(None)` are SAS missing values.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureValue {
    Number(Option<f64>),
    Text(String),
}

impl From<f64> for FixtureValue {
    fn from(value: f64) -> Self {
        FixtureValue::Number(Some(value))
    }
}

impl From<Option<f64>> for FixtureValue {
    fn from(value: Option<f64>) -> Self {
        FixtureValue::Number(value)
    }
}

impl From<&str> for FixtureValue {
    fn from(value: &str) -> Self {
        FixtureValue::Text(value.to_string())
    }
}

impl From<Option<&str>> for FixtureValue {
    fn from(value: Option<&str>) -> Self {
        FixtureValue::Text(value.unwrap_or_default().to_string())
    }
}

#[derive(Debug, Clone)]
struct FixtureColumn {
    name: String,
    kind: ColumnKind,
    offset: usize,
    width: usize,
}

struct Subheader {
    body: Vec<u8>,
    compression: u8,
    kind: u8,
}

#[derive(Debug, Clone)]
pub struct SasFileBuilder {
    word_size: WordSize,
    endianness: Endianness,
    compression: Compression,
    dataset_name: String,
    page_length: usize,
    columns: Vec<FixtureColumn>,
    rows: Vec<Vec<FixtureValue>>,
    declared_rows: Option<usize>,
    mix_page_rows: usize,
}

impl SasFileBuilder {
    pub fn new(word_size: WordSize, endianness: Endianness) -> Self {
        Self {
            word_size,
            endianness,
            compression: Compression::None,
            dataset_name: "FIXTURE".to_string(),
            page_length: DEFAULT_PAGE_LEN,
            columns: Vec::new(),
            rows: Vec::new(),
            declared_rows: None,
            mix_page_rows: 0,
        }
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn dataset_name(mut self, name: &str) -> Self {
        self.dataset_name = name.to_string();
        self
    }

    pub fn page_length(mut self, page_length: usize) -> Self {
        self.page_length = page_length;
        self
    }

    /// Numeric column stored in `width` bytes (1 to 8). Narrow columns keep
    /// the high-order bytes of the double.
    pub fn numeric(self, name: &str, width: usize) -> Self {
        self.column(name, ColumnKind::Numeric, width)
    }

    pub fn character(self, name: &str, width: usize) -> Self {
        self.column(name, ColumnKind::Character, width)
    }

    fn column(mut self, name: &str, kind: ColumnKind, width: usize) -> Self {
        let offset = self.row_length();
        self.columns.push(FixtureColumn {
            name: name.to_string(),
            kind,
            offset,
            width,
        });
        self
    }

    pub fn row(mut self, values: Vec<FixtureValue>) -> Self {
        self.rows.push(values);
        self
    }

    /// Row count written to the row size subheader, when it should differ
    /// from the rows actually stored.
    pub fn declared_rows(mut self, count: usize) -> Self {
        self.declared_rows = Some(count);
        self
    }

    /// Stores the first `count` rows on a mix page after the metadata.
    /// Ignored for compressed files.
    pub fn mix_page_rows(mut self, count: usize) -> Self {
        self.mix_page_rows = count;
        self
    }

    pub fn row_length(&self) -> usize {
        self.columns.iter().map(|column| column.width).sum()
    }

    pub fn build(&self) -> Vec<u8> {
        let pages = match self.compression {
            Compression::None => self.uncompressed_pages(),
            Compression::Rle | Compression::Rdc => self.compressed_pages(),
        };

        let mut file = self.header(pages.len());
        for page in pages {
            file.extend(page);
        }
        file
    }

    fn int_len(&self) -> usize {
        self.word_size.int_len()
    }

    fn page_bit_offset(&self) -> usize {
        self.word_size.page_bit_offset()
    }

    fn pointer_len(&self) -> usize {
        self.word_size.subheader_pointer_len()
    }

    fn put(&self, buf: &mut [u8], at: usize, value: u64, width: usize) {
        match self.endianness {
            Endianness::Little => {
                buf[at..at + width].copy_from_slice(&value.to_le_bytes()[..width]);
            }
            Endianness::Big => {
                buf[at..at + width].copy_from_slice(&value.to_be_bytes()[8 - width..]);
            }
        }
    }

    fn put_int(&self, buf: &mut [u8], at: usize, value: usize) {
        self.put(buf, at, value as u64, self.int_len());
    }

    fn header(&self, page_count: usize) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[..MAGIC.len()].copy_from_slice(&MAGIC);
        let align = match self.word_size {
            WordSize::Bits64 => {
                buf[32] = b'3';
                buf[35] = b'3';
                4
            }
            WordSize::Bits32 => {
                buf[32] = b'2';
                buf[35] = b'2';
                0
            }
        };
        buf[37] = match self.endianness {
            Endianness::Little => 0x01,
            Endianness::Big => 0x00,
        };
        buf[70] = 20;
        let name = self.dataset_name.as_bytes();
        buf[92..92 + name.len()].copy_from_slice(name);
        self.put(&mut buf, 196 + align, HEADER_LEN as u64, 4);
        self.put(&mut buf, 200 + align, self.page_length as u64, 4);
        self.put_int(&mut buf, 204 + align, page_count);
        buf
    }

    fn signature(&self, body: &mut [u8], signature: u64) {
        self.put(body, 0, signature, self.int_len());
    }

    fn row_size(&self, mix_rows: usize) -> Vec<u8> {
        let int_len = self.int_len();
        let mut body = vec![0u8; 16 * int_len];
        self.signature(&mut body, ROW_SIZE_SIGNATURE);
        self.put_int(&mut body, 5 * int_len, self.row_length());
        self.put_int(
            &mut body,
            6 * int_len,
            self.declared_rows.unwrap_or(self.rows.len()),
        );
        self.put_int(&mut body, 15 * int_len, mix_rows);
        body
    }

    fn column_size(&self) -> Vec<u8> {
        let int_len = self.int_len();
        let mut body = vec![0u8; 3 * int_len];
        self.signature(&mut body, COLUMN_SIZE_SIGNATURE);
        self.put_int(&mut body, int_len, self.columns.len());
        body
    }

    /// Offsets of each column name inside the single text block.
    fn name_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.columns.len());
        let mut at = TEXT_NAMES_OFFSET;
        for column in &self.columns {
            offsets.push(at);
            at += column.name.len().next_multiple_of(4);
        }
        offsets
    }

    fn column_text(&self) -> Vec<u8> {
        let offsets = self.name_offsets();
        let block_len = offsets.last().zip(self.columns.last()).map_or(
            TEXT_NAMES_OFFSET,
            |(offset, column)| offset + column.name.len().next_multiple_of(4),
        );

        let mut block = vec![b' '; block_len];
        self.put(&mut block, 0, block_len as u64, 2);
        let literal: &[u8] = match self.compression {
            Compression::None => b"        ",
            Compression::Rle => b"SASYZCRL",
            Compression::Rdc => b"SASYZCR2",
        };
        block[TEXT_LITERAL_OFFSET..TEXT_LITERAL_OFFSET + 8].copy_from_slice(literal);
        for (column, offset) in self.columns.iter().zip(&offsets) {
            block[*offset..offset + column.name.len()].copy_from_slice(column.name.as_bytes());
        }

        let mut body = vec![0u8; self.int_len()];
        self.signature(&mut body, COLUMN_TEXT_SIGNATURE);
        body.extend(block);
        body
    }

    fn column_names(&self) -> Vec<u8> {
        let int_len = self.int_len();
        let mut body = vec![0u8; 2 * int_len + 12 + 8 * self.columns.len()];
        self.signature(&mut body, COLUMN_NAME_SIGNATURE);
        for (idx, (column, offset)) in self.columns.iter().zip(self.name_offsets()).enumerate() {
            let at = int_len + 8 * (idx + 1);
            self.put(&mut body, at, 0, 2);
            self.put(&mut body, at + 2, offset as u64, 2);
            self.put(&mut body, at + 4, column.name.len() as u64, 2);
        }
        body
    }

    fn column_attributes(&self) -> Vec<u8> {
        let int_len = self.int_len();
        let stride = int_len + 8;
        let mut body = vec![0u8; 2 * int_len + 12 + stride * self.columns.len()];
        self.signature(&mut body, COLUMN_ATTRIBUTES_SIGNATURE);
        for (idx, column) in self.columns.iter().enumerate() {
            let at = idx * stride;
            self.put_int(&mut body, int_len + 8 + at, column.offset);
            self.put(&mut body, 2 * int_len + 8 + at, column.width as u64, 4);
            body[2 * int_len + 14 + at] = match column.kind {
                ColumnKind::Numeric => 1,
                ColumnKind::Character => 2,
            };
        }
        body
    }

    fn metadata_subheaders(&self, mix_rows: usize) -> Vec<Subheader> {
        [
            self.row_size(mix_rows),
            self.column_size(),
            self.column_text(),
            self.column_names(),
            self.column_attributes(),
        ]
        .into_iter()
        .map(|body| Subheader {
            body,
            compression: 0,
            kind: 0,
        })
        .collect()
    }

    fn encode_row(&self, values: &[FixtureValue]) -> Vec<u8> {
        let mut row = vec![0u8; self.row_length()];
        for (column, value) in self.columns.iter().zip(values) {
            let cell = &mut row[column.offset..column.offset + column.width];
            match value {
                FixtureValue::Number(number) => {
                    let number = number.unwrap_or(f64::NAN);
                    match self.endianness {
                        Endianness::Little => {
                            cell.copy_from_slice(&number.to_le_bytes()[8 - column.width..]);
                        }
                        Endianness::Big => {
                            cell.copy_from_slice(&number.to_be_bytes()[..column.width]);
                        }
                    }
                }
                FixtureValue::Text(text) => {
                    cell.fill(b' ');
                    let len = text.len().min(column.width);
                    cell[..len].copy_from_slice(&text.as_bytes()[..len]);
                }
            }
        }
        row
    }

    /// Pointers from the top of the page, bodies from the bottom.
    fn subheader_page(&self, page_type: u16, subheaders: &[Subheader]) -> Vec<u8> {
        let int_len = self.int_len();
        let bit_offset = self.page_bit_offset();
        let mut page = vec![0u8; self.page_length];
        self.put(&mut page, bit_offset, u64::from(page_type), 2);
        self.put(&mut page, bit_offset + 2, subheaders.len() as u64, 2);
        self.put(&mut page, bit_offset + 4, subheaders.len() as u64, 2);

        let mut end = self.page_length;
        for (idx, subheader) in subheaders.iter().enumerate() {
            end -= subheader.body.len();
            page[end..end + subheader.body.len()].copy_from_slice(&subheader.body);
            let pointer = bit_offset + 8 + idx * self.pointer_len();
            self.put_int(&mut page, pointer, end);
            self.put_int(&mut page, pointer + int_len, subheader.body.len());
            page[pointer + 2 * int_len] = subheader.compression;
            page[pointer + 2 * int_len + 1] = subheader.kind;
        }
        page
    }

    fn uncompressed_pages(&self) -> Vec<Vec<u8>> {
        let row_length = self.row_length();
        let rows: Vec<Vec<u8>> = self.rows.iter().map(|row| self.encode_row(row)).collect();
        let mix_rows = self.mix_page_rows.min(rows.len());

        let mut pages = Vec::new();
        if mix_rows > 0 {
            let subheaders = self.metadata_subheaders(mix_rows);
            let mut page = self.subheader_page(PAGE_MIX, &subheaders);
            let pointers_end = self.page_bit_offset() + 8 + subheaders.len() * self.pointer_len();
            let start = pointers_end + pointers_end % 8;
            for (idx, row) in rows[..mix_rows].iter().enumerate() {
                let at = start + idx * row_length;
                page[at..at + row_length].copy_from_slice(row);
            }
            pages.push(page);
        } else {
            pages.push(self.subheader_page(PAGE_META, &self.metadata_subheaders(0)));
        }

        let start = self.page_bit_offset() + 8;
        let per_page = ((self.page_length - start) / row_length.max(1)).max(1);
        for chunk in rows[mix_rows..].chunks(per_page) {
            let mut page = vec![0u8; self.page_length];
            self.put(&mut page, start - 8, u64::from(PAGE_DATA), 2);
            self.put(&mut page, start - 6, chunk.len() as u64, 2);
            for (idx, row) in chunk.iter().enumerate() {
                let at = start + idx * row_length;
                page[at..at + row_length].copy_from_slice(row);
            }
            pages.push(page);
        }
        pages
    }

    fn compressed_pages(&self) -> Vec<Vec<u8>> {
        let mut subheaders = self.metadata_subheaders(0);
        for values in &self.rows {
            let row = self.encode_row(values);
            let packed = match self.compression {
                Compression::Rdc => rdc_compress(&row),
                _ => rle_compress(&row),
            };
            // Rows that do not shrink are stored as they are.
            subheaders.push(if packed.len() < row.len() {
                Subheader {
                    body: packed,
                    compression: 4,
                    kind: 1,
                }
            } else {
                Subheader {
                    body: row,
                    compression: 0,
                    kind: 1,
                }
            });
        }

        let fixed = self.page_bit_offset() + 8;
        let mut pages = Vec::new();
        let mut current: Vec<Subheader> = Vec::new();
        let mut used = fixed;
        for subheader in subheaders {
            let needed = self.pointer_len() + subheader.body.len();
            if !current.is_empty() && used + needed > self.page_length {
                pages.push(self.subheader_page(PAGE_META, &current));
                current.clear();
                used = fixed;
            }
            used += needed;
            current.push(subheader);
        }
        pages.push(self.subheader_page(PAGE_META, &current));
        pages
    }
}

fn run_length(row: &[u8], start: usize, max: usize) -> usize {
    row[start..]
        .iter()
        .take(max)
        .take_while(|byte| **byte == row[start])
        .count()
}

/// `SASYZCRL` encoding using blank, zero and byte runs plus short literal copies.
pub fn rle_compress(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let flush = |out: &mut Vec<u8>, literal: &mut Vec<u8>| {
        for chunk in literal.chunks(16) {
            out.push(0x80 | (chunk.len() as u8 - 1));
            out.extend_from_slice(chunk);
        }
        literal.clear();
    };

    let mut pos = 0;
    while pos < row.len() {
        let byte = row[pos];
        let run = match byte {
            b' ' | 0 => run_length(row, pos, 17),
            _ => run_length(row, pos, 18),
        };
        if run < 3 {
            literal.push(byte);
            pos += 1;
            continue;
        }
        flush(&mut out, &mut literal);
        match byte {
            b' ' => out.push(0xE0 | (run as u8 - 2)),
            0 => out.push(0xF0 | (run as u8 - 2)),
            _ => out.extend_from_slice(&[0xC0 | (run as u8 - 3), byte]),
        }
        pos += run;
    }
    flush(&mut out, &mut literal);
    out
}

/// `SASYZCR2` encoding using literals and short runs.
pub fn rdc_compress(row: &[u8]) -> Vec<u8> {
    // (is_command, encoded bytes)
    let mut items: Vec<(bool, Vec<u8>)> = Vec::new();
    let mut pos = 0;
    while pos < row.len() {
        let run = run_length(row, pos, 18);
        if run >= 3 {
            items.push((true, vec![run as u8 - 3, row[pos]]));
            pos += run;
        } else {
            items.push((false, vec![row[pos]]));
            pos += 1;
        }
    }

    let mut out = Vec::new();
    for group in items.chunks(16) {
        let control = group
            .iter()
            .enumerate()
            .filter(|(_, (command, _))| *command)
            .fold(0u16, |bits, (idx, _)| bits | (0x8000 >> idx));
        out.extend_from_slice(&control.to_be_bytes());
        for (_, bytes) in group {
            out.extend_from_slice(bytes);
        }
    }
    out
}
