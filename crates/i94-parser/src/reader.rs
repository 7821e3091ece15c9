use crate::errors::ParserError;
use crate::model::Endianness;

/// Bounds-checked, endian-aware view over a byte slice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteView<'a> {
    bytes: &'a [u8],
    endianness: Endianness,
}

impl<'a> ByteView<'a> {
    pub fn new(bytes: &'a [u8], endianness: Endianness) -> Self {
        Self { bytes, endianness }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], ParserError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(ParserError::Truncated {
                offset,
                len,
                available: self.bytes.len(),
            })
    }

    pub fn sub(&self, offset: usize, len: usize) -> Result<ByteView<'a>, ParserError> {
        Ok(ByteView::new(self.slice(offset, len)?, self.endianness))
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], ParserError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub fn u8(&self, offset: usize) -> Result<u8, ParserError> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn u16(&self, offset: usize) -> Result<u16, ParserError> {
        let raw = self.array::<2>(offset)?;
        Ok(match self.endianness {
            Endianness::Little => u16::from_le_bytes(raw),
            Endianness::Big => u16::from_be_bytes(raw),
        })
    }

    pub fn u32(&self, offset: usize) -> Result<u32, ParserError> {
        let raw = self.array::<4>(offset)?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(raw),
            Endianness::Big => u32::from_be_bytes(raw),
        })
    }

    pub fn u64(&self, offset: usize) -> Result<u64, ParserError> {
        let raw = self.array::<8>(offset)?;
        Ok(match self.endianness {
            Endianness::Little => u64::from_le_bytes(raw),
            Endianness::Big => u64::from_be_bytes(raw),
        })
    }

    /// Reads a 4- or 8-byte integer as `usize`.
    pub fn int(&self, offset: usize, width: usize) -> Result<usize, ParserError> {
        let value = match width {
            4 => u64::from(self.u32(offset)?),
            8 => self.u64(offset)?,
            other => {
                return Err(ParserError::InvalidHeader(format!(
                    "unsupported integer width {other}"
                )))
            }
        };
        usize::try_from(value).map_err(|_| {
            ParserError::InvalidHeader(format!("integer {value} at offset {offset} overflows"))
        })
    }
}

/// Widens a stored numeric value to a full double. SAS drops the low-order
/// mantissa bytes of narrow columns, so the stored bytes are the most
/// significant ones.
pub(crate) fn decode_numeric(raw: &[u8], endianness: Endianness) -> Option<f64> {
    let width = raw.len();
    if width == 0 || width > 8 {
        return None;
    }

    let mut buf = [0u8; 8];
    let value = match endianness {
        Endianness::Little => {
            buf[8 - width..].copy_from_slice(raw);
            f64::from_le_bytes(buf)
        }
        Endianness::Big => {
            buf[..width].copy_from_slice(raw);
            f64::from_be_bytes(buf)
        }
    };

    // Every SAS missing value (., .A-.Z, ._) is a NaN bit pattern.
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}
