//! Low-level TIFF structure: byte order, field formats, and bounds-checked access
//! to a raw segment.

use crate::error::{ExifError, Result};

/// Byte order declared in the TIFF header (`II` or `MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Read the byte order marker at the start of a TIFF header.
    pub fn from_marker(marker: &[u8]) -> Option<Self> {
        match marker.get(0..2)? {
            b"II" => Some(Self::Little),
            b"MM" => Some(Self::Big),
            _ => None,
        }
    }

    pub fn marker(self) -> &'static [u8; 2] {
        match self {
            Self::Little => b"II",
            Self::Big => b"MM",
        }
    }

    pub fn u16_from(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    pub fn u32_from(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }

    pub fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }
}

/// TIFF field type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
}

impl TagFormat {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Ascii => 2,
            Self::Short => 3,
            Self::Long => 4,
            Self::Rational => 5,
            Self::SByte => 6,
            Self::Undefined => 7,
            Self::SShort => 8,
            Self::SLong => 9,
            Self::SRational => 10,
            Self::Float => 11,
            Self::Double => 12,
        }
    }

    /// Size in bytes of one component.
    pub fn unit_size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::SByte | Self::SShort | Self::SLong | Self::SRational)
    }
}

/// Bounds-checked view over a TIFF segment in a fixed byte order.
#[derive(Debug, Clone, Copy)]
pub struct TiffView<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> TiffView<'a> {
    /// Validate the 8-byte TIFF header and return the view plus the IFD0 offset.
    pub fn parse_header(data: &'a [u8]) -> Result<(Self, u32)> {
        if data.len() < 8 {
            return Err(ExifError::malformed(format!(
                "TIFF header needs 8 bytes, segment has {}",
                data.len()
            )));
        }
        let order = ByteOrder::from_marker(data)
            .ok_or_else(|| ExifError::malformed("invalid TIFF byte order marker"))?;
        let view = Self { data, order };
        let magic = view.u16_at(2)?;
        if magic != 42 {
            return Err(ExifError::malformed(format!("bad TIFF magic number {magic}")));
        }
        let ifd0 = view.u32_at(4)?;
        Ok((view, ifd0))
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                ExifError::malformed(format!(
                    "range {offset}+{len} exceeds segment of {} bytes",
                    self.data.len()
                ))
            })
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(self.order.u16_from([b[0], b[1]]))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(self.order.u32_from([b[0], b[1], b[2], b[3]]))
    }
}
