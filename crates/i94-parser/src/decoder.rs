use polars::prelude::*;

use crate::compression::{rdc_decompress, rle_decompress};
use crate::errors::ParserError;
use crate::header::{parse_header, SasHeader};
use crate::model::{
    decode_text, ColumnKind, Compression, Endianness, ReadOptions, SasColumn, SasDataset,
    SasMetadata,
};
use crate::reader::{decode_numeric, ByteView};
use crate::subheaders::{classify, MetadataBuilder, SubheaderKind};

const PAGE_TYPE_MASK: u16 = 0xFF00;
const PAGE_META: u16 = 0x0000;
const PAGE_DATA: u16 = 0x0100;
const PAGE_MIX: u16 = 0x0200;
const PAGE_AMD: u16 = 0x0400;
const PAGE_META2: u16 = 0x4000;
const PAGE_COMP: u16 = 0x9000;

const SUBHEADER_POINTERS_OFFSET: usize = 8;
const TRUNCATED_SUBHEADER: u8 = 1;
const COMPRESSED_SUBHEADER: u8 = 4;
const COMPRESSED_SUBHEADER_TYPE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Meta,
    Data,
    Mix,
    Amd,
    Comp,
}

impl PageKind {
    fn carries_subheaders(self) -> bool {
        matches!(self, PageKind::Meta | PageKind::Mix | PageKind::Amd)
    }
}

struct Page<'a> {
    index: usize,
    view: ByteView<'a>,
    kind: PageKind,
    block_count: usize,
    subheader_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct SubheaderPointer {
    offset: usize,
    length: usize,
    compression: u8,
    kind: u8,
}

enum SubheaderRole<'a> {
    Metadata(SubheaderKind),
    Row,
    Skip,
    Unknown(&'a [u8]),
}

/// Decodes a SAS7BDAT file held in memory.
///
/// Numeric columns become `Float64` (SAS missing values are null), character
/// columns become `String` (blank values are null). With
/// [`ReadOptions::row_limit`] set, page scanning stops as soon as enough rows
/// have been decoded.
pub fn parse_sas7bdat(bytes: &[u8], options: &ReadOptions) -> Result<SasDataset, ParserError> {
    let header = parse_header(bytes)?;
    let file = ByteView::new(bytes, header.endianness);
    let metadata = read_metadata(&file, &header)?;

    let target = options
        .row_limit
        .map_or(metadata.row_count, |limit| limit.min(metadata.row_count));
    // Reserve no more rows than the pages can hold, whatever the row count claims.
    let page_capacity =
        header.page_count.saturating_mul(header.page_length) / metadata.row_length.max(1);
    let mut buffers = RowBuffers::new(&metadata.columns, target.min(page_capacity));

    for index in 0..header.page_count {
        if buffers.rows >= target {
            break;
        }
        let page = read_page(&file, &header, index)?;
        read_page_rows(&page, &header, &metadata, &mut buffers, target)?;
    }

    if buffers.rows < target {
        return Err(ParserError::MissingRows {
            expected: target,
            found: buffers.rows,
        });
    }

    let df = buffers.into_dataframe(&metadata.columns)?;
    Ok(SasDataset { metadata, df })
}

fn read_metadata(file: &ByteView<'_>, header: &SasHeader) -> Result<SasMetadata, ParserError> {
    let mut builder = MetadataBuilder::new(header.word_size);

    for index in 0..header.page_count {
        let page = read_page(file, header, index)?;
        if !page.kind.carries_subheaders() {
            continue;
        }
        for pointer in subheader_pointers(&page, header)? {
            if let SubheaderRole::Metadata(kind) =
                classify_pointer(&page, &pointer, header, builder.compression())?
            {
                builder.process(kind, &page.view, pointer.offset, pointer.length)?;
            }
        }
        if builder.is_complete() {
            break;
        }
    }

    builder.finish(header)
}

fn read_page<'a>(
    file: &ByteView<'a>,
    header: &SasHeader,
    index: usize,
) -> Result<Page<'a>, ParserError> {
    let offset = header.header_length + index * header.page_length;
    let view = file.sub(offset, header.page_length)?;
    let bit_offset = header.word_size.page_bit_offset();

    let raw_type = view.u16(bit_offset)?;
    let kind = match raw_type & PAGE_TYPE_MASK {
        PAGE_META | PAGE_META2 => PageKind::Meta,
        PAGE_DATA => PageKind::Data,
        PAGE_MIX => PageKind::Mix,
        PAGE_AMD => PageKind::Amd,
        PAGE_COMP => PageKind::Comp,
        _ => {
            return Err(ParserError::UnknownPageType {
                page: index,
                page_type: raw_type,
            })
        }
    };

    Ok(Page {
        index,
        view,
        kind,
        block_count: usize::from(view.u16(bit_offset + 2)?),
        subheader_count: usize::from(view.u16(bit_offset + 4)?),
    })
}

fn subheader_pointers(
    page: &Page<'_>,
    header: &SasHeader,
) -> Result<Vec<SubheaderPointer>, ParserError> {
    let int_len = header.word_size.int_len();
    let pointer_len = header.word_size.subheader_pointer_len();
    let base = header.word_size.page_bit_offset() + SUBHEADER_POINTERS_OFFSET;

    (0..page.subheader_count)
        .map(|idx| -> Result<SubheaderPointer, ParserError> {
            let at = base + idx * pointer_len;
            Ok(SubheaderPointer {
                offset: page.view.int(at, int_len)?,
                length: page.view.int(at + int_len, int_len)?,
                compression: page.view.u8(at + 2 * int_len)?,
                kind: page.view.u8(at + 2 * int_len + 1)?,
            })
        })
        .collect()
}

fn classify_pointer<'a>(
    page: &Page<'a>,
    pointer: &SubheaderPointer,
    header: &SasHeader,
    compression: Compression,
) -> Result<SubheaderRole<'a>, ParserError> {
    if pointer.length == 0 || pointer.compression == TRUNCATED_SUBHEADER {
        return Ok(SubheaderRole::Skip);
    }

    let signature_len = header.word_size.int_len().min(pointer.length);
    let signature = page.view.slice(pointer.offset, signature_len)?;
    if let Some(kind) = classify(signature) {
        return Ok(SubheaderRole::Metadata(kind));
    }

    let row_like = matches!(pointer.compression, 0 | COMPRESSED_SUBHEADER)
        && pointer.kind == COMPRESSED_SUBHEADER_TYPE;
    if compression != Compression::None && row_like {
        Ok(SubheaderRole::Row)
    } else {
        Ok(SubheaderRole::Unknown(signature))
    }
}

fn read_page_rows(
    page: &Page<'_>,
    header: &SasHeader,
    metadata: &SasMetadata,
    buffers: &mut RowBuffers,
    target: usize,
) -> Result<(), ParserError> {
    let row_length = metadata.row_length;
    let bit_offset = header.word_size.page_bit_offset();

    if page.kind.carries_subheaders() {
        for pointer in subheader_pointers(page, header)? {
            if buffers.rows >= target {
                return Ok(());
            }
            match classify_pointer(page, &pointer, header, metadata.compression)? {
                SubheaderRole::Row => {
                    let raw = page.view.slice(pointer.offset, pointer.length)?;
                    let row = expand_row(raw, metadata)?;
                    buffers.push(&row, &metadata.columns, page.view.endianness())?;
                }
                SubheaderRole::Unknown(signature) => {
                    return Err(ParserError::UnknownSubheader {
                        page: page.index,
                        signature: signature.to_vec(),
                    })
                }
                SubheaderRole::Metadata(_) | SubheaderRole::Skip => {}
            }
        }
    }

    let (start, rows_on_page) = match page.kind {
        PageKind::Data => (bit_offset + SUBHEADER_POINTERS_OFFSET, page.block_count),
        PageKind::Mix => {
            let pointers_end = bit_offset
                + SUBHEADER_POINTERS_OFFSET
                + page.subheader_count * header.word_size.subheader_pointer_len();
            let rows = metadata.mix_page_row_count.min(metadata.row_count);
            (pointers_end + pointers_end % 8, rows)
        }
        PageKind::Meta | PageKind::Amd | PageKind::Comp => return Ok(()),
    };

    for idx in 0..rows_on_page {
        if buffers.rows >= target {
            break;
        }
        let row = page.view.slice(start + idx * row_length, row_length)?;
        buffers.push(row, &metadata.columns, page.view.endianness())?;
    }

    Ok(())
}

fn expand_row(raw: &[u8], metadata: &SasMetadata) -> Result<Vec<u8>, ParserError> {
    if raw.len() < metadata.row_length {
        match metadata.compression {
            Compression::Rle => rle_decompress(raw, metadata.row_length),
            Compression::Rdc => rdc_decompress(raw, metadata.row_length),
            Compression::None => Err(ParserError::Truncated {
                offset: 0,
                len: metadata.row_length,
                available: raw.len(),
            }),
        }
    } else {
        Ok(raw[..metadata.row_length].to_vec())
    }
}

enum ColumnBuffer {
    Numeric(Vec<Option<f64>>),
    Character(Vec<Option<String>>),
}

struct RowBuffers {
    columns: Vec<ColumnBuffer>,
    rows: usize,
}

impl RowBuffers {
    fn new(columns: &[SasColumn], capacity: usize) -> Self {
        let columns = columns
            .iter()
            .map(|column| match column.kind {
                ColumnKind::Numeric => ColumnBuffer::Numeric(Vec::with_capacity(capacity)),
                ColumnKind::Character => ColumnBuffer::Character(Vec::with_capacity(capacity)),
            })
            .collect();
        Self { columns, rows: 0 }
    }

    fn push(
        &mut self,
        row: &[u8],
        columns: &[SasColumn],
        endianness: Endianness,
    ) -> Result<(), ParserError> {
        for (buffer, column) in self.columns.iter_mut().zip(columns) {
            let raw = row
                .get(column.offset..column.offset + column.width)
                .ok_or_else(|| ParserError::Column {
                    column: column.name.clone(),
                    message: format!("row of {} bytes is too short", row.len()),
                })?;
            match buffer {
                ColumnBuffer::Numeric(values) => values.push(decode_numeric(raw, endianness)),
                ColumnBuffer::Character(values) => {
                    let text = decode_text(raw);
                    values.push((!text.is_empty()).then_some(text));
                }
            }
        }
        self.rows += 1;
        Ok(())
    }

    fn into_dataframe(self, columns: &[SasColumn]) -> Result<DataFrame, ParserError> {
        let series: Vec<Column> = self
            .columns
            .into_iter()
            .zip(columns)
            .map(|(buffer, column)| {
                let name: PlSmallStr = column.name.as_str().into();
                match buffer {
                    ColumnBuffer::Numeric(values) => Column::from(Series::new(name, values)),
                    ColumnBuffer::Character(values) => Column::from(Series::new(name, values)),
                }
            })
            .collect();
        Ok(DataFrame::new(series)?)
    }
}
