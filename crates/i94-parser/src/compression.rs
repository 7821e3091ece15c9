use crate::errors::ParserError;

const RLE: &str = "RLE";
const RDC: &str = "RDC";

fn byte_at(input: &[u8], idx: usize, scheme: &'static str) -> Result<u8, ParserError> {
    input
        .get(idx)
        .copied()
        .ok_or_else(|| ParserError::Decompression {
            scheme,
            message: format!("unexpected end of input at byte {idx}"),
        })
}

fn bytes_at<'a>(
    input: &'a [u8],
    idx: usize,
    len: usize,
    scheme: &'static str,
) -> Result<&'a [u8], ParserError> {
    input
        .get(idx..idx + len)
        .ok_or_else(|| ParserError::Decompression {
            scheme,
            message: format!("copy of {len} bytes at {idx} runs past the input"),
        })
}

fn check_length(out: &[u8], expected: usize, scheme: &'static str) -> Result<(), ParserError> {
    if out.len() == expected {
        Ok(())
    } else {
        Err(ParserError::Decompression {
            scheme,
            message: format!("produced {} bytes, expected {expected}", out.len()),
        })
    }
}

/// Expands a `SASYZCRL` row.
pub(crate) fn rle_decompress(input: &[u8], row_length: usize) -> Result<Vec<u8>, ParserError> {
    let mut out = Vec::with_capacity(row_length);
    let mut pos = 0;

    while pos < input.len() {
        let control = input[pos] & 0xF0;
        let low = usize::from(input[pos] & 0x0F);
        pos += 1;

        match control {
            0x00 => {
                let count = usize::from(byte_at(input, pos, RLE)?) + 64 + low * 256;
                pos += 1;
                out.extend_from_slice(bytes_at(input, pos, count, RLE)?);
                pos += count;
            }
            0x40 => {
                let count = low * 256 + usize::from(byte_at(input, pos, RLE)?) + 18;
                let value = byte_at(input, pos + 1, RLE)?;
                pos += 2;
                out.resize(out.len() + count, value);
            }
            0x60 => {
                let count = low * 256 + usize::from(byte_at(input, pos, RLE)?) + 17;
                pos += 1;
                out.resize(out.len() + count, b' ');
            }
            0x70 => {
                let count = low * 256 + usize::from(byte_at(input, pos, RLE)?) + 17;
                pos += 1;
                out.resize(out.len() + count, 0);
            }
            0x80 | 0x90 | 0xA0 | 0xB0 => {
                let base = match control {
                    0x80 => 1,
                    0x90 => 17,
                    0xA0 => 33,
                    _ => 49,
                };
                let count = low + base;
                out.extend_from_slice(bytes_at(input, pos, count, RLE)?);
                pos += count;
            }
            0xC0 => {
                let value = byte_at(input, pos, RLE)?;
                pos += 1;
                out.resize(out.len() + low + 3, value);
            }
            0xD0 => out.resize(out.len() + low + 2, b'@'),
            0xE0 => out.resize(out.len() + low + 2, b' '),
            0xF0 => out.resize(out.len() + low + 2, 0),
            other => {
                return Err(ParserError::Decompression {
                    scheme: RLE,
                    message: format!("unknown control byte {other:#04x}"),
                })
            }
        }
    }

    check_length(&out, row_length, RLE)?;
    Ok(out)
}

/// Expands a `SASYZCR2` row.
pub(crate) fn rdc_decompress(input: &[u8], row_length: usize) -> Result<Vec<u8>, ParserError> {
    let mut out: Vec<u8> = Vec::with_capacity(row_length);
    let mut pos = 0;
    let mut ctrl_bits: u16 = 0;
    let mut ctrl_mask: u16 = 0;

    while pos < input.len() {
        ctrl_mask >>= 1;
        if ctrl_mask == 0 {
            ctrl_bits =
                u16::from_be_bytes([byte_at(input, pos, RDC)?, byte_at(input, pos + 1, RDC)?]);
            pos += 2;
            ctrl_mask = 0x8000;
        }

        if ctrl_bits & ctrl_mask == 0 {
            out.push(byte_at(input, pos, RDC)?);
            pos += 1;
            continue;
        }

        let command = usize::from(byte_at(input, pos, RDC)? >> 4);
        let count = usize::from(byte_at(input, pos, RDC)? & 0x0F);
        pos += 1;

        match command {
            // short run
            0 => {
                let value = byte_at(input, pos, RDC)?;
                pos += 1;
                out.resize(out.len() + count + 3, value);
            }
            // long run
            1 => {
                let count = count + (usize::from(byte_at(input, pos, RDC)?) << 4) + 19;
                let value = byte_at(input, pos + 1, RDC)?;
                pos += 2;
                out.resize(out.len() + count, value);
            }
            // long back-reference
            2 => {
                let offset = count + 3 + (usize::from(byte_at(input, pos, RDC)?) << 4);
                let length = usize::from(byte_at(input, pos + 1, RDC)?) + 16;
                pos += 2;
                copy_back(&mut out, offset, length)?;
            }
            // short back-reference, the command is the length
            _ => {
                let offset = count + 3 + (usize::from(byte_at(input, pos, RDC)?) << 4);
                pos += 1;
                copy_back(&mut out, offset, command)?;
            }
        }
    }

    check_length(&out, row_length, RDC)?;
    Ok(out)
}

fn copy_back(out: &mut Vec<u8>, offset: usize, length: usize) -> Result<(), ParserError> {
    let start = out
        .len()
        .checked_sub(offset)
        .ok_or_else(|| ParserError::Decompression {
            scheme: RDC,
            message: format!("back-reference {offset} precedes start of output"),
        })?;
    for idx in 0..length {
        let value = out[start + idx];
        out.push(value);
    }
    Ok(())
}
