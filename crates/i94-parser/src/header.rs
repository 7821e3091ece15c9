use crate::errors::ParserError;
use crate::model::{decode_text, Endianness, WordSize};
use crate::reader::ByteView;

pub(crate) const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc2, 0xea, 0x81, 0x60,
    0xb3, 0x14, 0x11, 0xcf, 0xbd, 0x92, 0x08, 0x00, 0x09, 0xc7, 0x31, 0x8c, 0x18, 0x1f, 0x10, 0x11,
];

const MIN_HEADER_LEN: usize = 288;

const WORD_SIZE_OFFSET: usize = 32;
const ALIGN_OFFSET: usize = 35;
const ENDIANNESS_OFFSET: usize = 37;
const ENCODING_OFFSET: usize = 70;
const DATASET_NAME_OFFSET: usize = 92;
const DATASET_NAME_LEN: usize = 64;
const HEADER_SIZE_OFFSET: usize = 196;
const PAGE_SIZE_OFFSET: usize = 200;
const PAGE_COUNT_OFFSET: usize = 204;

/// The 64-bit and alignment markers are the ASCII digit `3`.
const LAYOUT_MARKER: u8 = b'3';

#[derive(Debug, Clone)]
pub(crate) struct SasHeader {
    pub word_size: WordSize,
    pub endianness: Endianness,
    pub encoding: u8,
    pub dataset_name: String,
    pub header_length: usize,
    pub page_length: usize,
    pub page_count: usize,
}

pub(crate) fn parse_header(bytes: &[u8]) -> Result<SasHeader, ParserError> {
    if bytes.len() < MIN_HEADER_LEN {
        return Err(ParserError::Truncated {
            offset: 0,
            len: MIN_HEADER_LEN,
            available: bytes.len(),
        });
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(ParserError::BadMagic);
    }

    let word_size = if bytes[WORD_SIZE_OFFSET] == LAYOUT_MARKER {
        WordSize::Bits64
    } else {
        WordSize::Bits32
    };
    let align = if bytes[ALIGN_OFFSET] == LAYOUT_MARKER {
        4
    } else {
        0
    };
    let endianness = if bytes[ENDIANNESS_OFFSET] == 0x01 {
        Endianness::Little
    } else {
        Endianness::Big
    };

    let view = ByteView::new(bytes, endianness);
    let dataset_name = decode_text(view.slice(DATASET_NAME_OFFSET, DATASET_NAME_LEN)?);
    let header_length = view.int(HEADER_SIZE_OFFSET + align, 4)?;
    let page_length = view.int(PAGE_SIZE_OFFSET + align, 4)?;
    let page_count = view.int(PAGE_COUNT_OFFSET + align, word_size.int_len())?;

    if header_length < MIN_HEADER_LEN {
        return Err(ParserError::InvalidHeader(format!(
            "header length {header_length} is shorter than {MIN_HEADER_LEN} bytes"
        )));
    }
    if page_length == 0 {
        return Err(ParserError::InvalidHeader("page length is zero".into()));
    }

    Ok(SasHeader {
        word_size,
        endianness,
        encoding: bytes[ENCODING_OFFSET],
        dataset_name,
        header_length,
        page_length,
        page_count,
    })
}
