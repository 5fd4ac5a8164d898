//! Typed tag values and their wire encoding.

use std::fmt;

use serde::Serialize;

use super::tags::ValueKind;
use super::tiff::{ByteOrder, TagFormat};

/// Charset marker written in front of UserComment text.
pub const USER_COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const USER_COMMENT_HEADER_LEN: usize = 8;

/// A numerator/denominator pair (RATIONAL or SRATIONAL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Decoded value of a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Integer(Vec<i64>),
    Rational(Vec<Rational>),
    /// Opaque bytes carried through encoding unchanged.
    Bytes(Vec<u8>),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(v) => write_list(f, v),
            Self::Rational(v) => write_list(f, v),
            Self::Bytes(b) => write!(f, "binary data of {} bytes", b.len()),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Coerce raw field bytes into a [`TagValue`].
///
/// `kind` is the dictionary framing for the tag, when it has one.
pub fn decode_value(
    raw: &[u8],
    format: TagFormat,
    order: ByteOrder,
    kind: Option<ValueKind>,
) -> TagValue {
    match kind {
        Some(ValueKind::UserComment) => return TagValue::Text(decode_user_comment(raw)),
        Some(ValueKind::Utf16) if matches!(format, TagFormat::Byte | TagFormat::Undefined) => {
            return TagValue::Text(decode_utf16le(raw));
        }
        _ => {}
    }

    match format {
        TagFormat::Ascii => match std::str::from_utf8(trim_nul(raw)) {
            Ok(s) => TagValue::Text(s.to_string()),
            Err(_) => TagValue::Bytes(raw.to_vec()),
        },
        TagFormat::Undefined => match printable_text(raw) {
            Some(s) => TagValue::Text(s),
            None => TagValue::Bytes(raw.to_vec()),
        },
        TagFormat::Byte => TagValue::Integer(raw.iter().map(|&b| b as i64).collect()),
        TagFormat::SByte => TagValue::Integer(raw.iter().map(|&b| b as i8 as i64).collect()),
        TagFormat::Short => TagValue::Integer(
            raw.chunks_exact(2)
                .map(|c| order.u16_from([c[0], c[1]]) as i64)
                .collect(),
        ),
        TagFormat::SShort => TagValue::Integer(
            raw.chunks_exact(2)
                .map(|c| order.u16_from([c[0], c[1]]) as i16 as i64)
                .collect(),
        ),
        TagFormat::Long => TagValue::Integer(
            raw.chunks_exact(4)
                .map(|c| order.u32_from([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
        ),
        TagFormat::SLong => TagValue::Integer(
            raw.chunks_exact(4)
                .map(|c| order.u32_from([c[0], c[1], c[2], c[3]]) as i32 as i64)
                .collect(),
        ),
        TagFormat::Rational => TagValue::Rational(
            raw.chunks_exact(8)
                .map(|c| {
                    Rational::new(
                        order.u32_from([c[0], c[1], c[2], c[3]]) as i64,
                        order.u32_from([c[4], c[5], c[6], c[7]]) as i64,
                    )
                })
                .collect(),
        ),
        TagFormat::SRational => TagValue::Rational(
            raw.chunks_exact(8)
                .map(|c| {
                    Rational::new(
                        order.u32_from([c[0], c[1], c[2], c[3]]) as i32 as i64,
                        order.u32_from([c[4], c[5], c[6], c[7]]) as i32 as i64,
                    )
                })
                .collect(),
        ),
        TagFormat::Float | TagFormat::Double => TagValue::Bytes(raw.to_vec()),
    }
}

fn trim_nul(raw: &[u8]) -> &[u8] {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &raw[..end]
}

/// UTF-8 text without control characters, or `None`.
fn printable_text(raw: &[u8]) -> Option<String> {
    let s = std::str::from_utf8(trim_nul(raw)).ok()?;
    if s.chars().any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')) {
        return None;
    }
    Some(s.to_string())
}

/// Strip the 8-byte charset marker and decode the rest, replacing invalid UTF-8.
pub fn decode_user_comment(raw: &[u8]) -> String {
    let payload = if raw.len() > USER_COMMENT_HEADER_LEN {
        &raw[USER_COMMENT_HEADER_LEN..]
    } else {
        raw
    };
    String::from_utf8_lossy(trim_nul(payload)).into_owned()
}

pub fn encode_user_comment(text: &str) -> Vec<u8> {
    let mut bytes = USER_COMMENT_ASCII.to_vec();
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let end = units.iter().rposition(|&u| u != 0).map_or(0, |p| p + 1);
    String::from_utf16_lossy(&units[..end])
}

/// Encode a string as UTF-16LE bytes with a NUL terminator (XP* tags).
fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    bytes.push(0);
    bytes.push(0);
    bytes
}

// ============================================================================
// Encoding
// ============================================================================

/// Serialize a value into field bytes; returns the bytes and the TIFF component count.
pub fn encode_value(
    value: &TagValue,
    format: TagFormat,
    order: ByteOrder,
    kind: Option<ValueKind>,
) -> (Vec<u8>, u32) {
    let bytes = match value {
        TagValue::Text(s) => match (kind, format) {
            (Some(ValueKind::UserComment), _) => encode_user_comment(s),
            (Some(ValueKind::Utf16), _) => encode_utf16le(s),
            (_, TagFormat::Ascii) => {
                let mut data = s.as_bytes().to_vec();
                data.push(0);
                data
            }
            _ => s.as_bytes().to_vec(),
        },
        TagValue::Integer(values) => {
            let mut data = Vec::with_capacity(values.len() * format.unit_size());
            for &v in values {
                match format {
                    TagFormat::Short | TagFormat::SShort => {
                        data.extend_from_slice(&order.u16_bytes(v as u16))
                    }
                    TagFormat::Long | TagFormat::SLong => {
                        data.extend_from_slice(&order.u32_bytes(v as u32))
                    }
                    _ => data.push(v as u8),
                }
            }
            data
        }
        TagValue::Rational(values) => {
            let mut data = Vec::with_capacity(values.len() * 8);
            for r in values {
                data.extend_from_slice(&order.u32_bytes(r.num as u32));
                data.extend_from_slice(&order.u32_bytes(r.den as u32));
            }
            data
        }
        TagValue::Bytes(b) => b.clone(),
    };
    let count = (bytes.len() / format.unit_size()) as u32;
    (bytes, count)
}

// ============================================================================
// Text input
// ============================================================================

/// Convert user-supplied text into a value for the given field format.
pub fn parse_text(text: &str, format: TagFormat) -> Result<TagValue, String> {
    match format {
        TagFormat::Ascii | TagFormat::Undefined => Ok(TagValue::Text(text.to_string())),
        TagFormat::Byte | TagFormat::SByte | TagFormat::Short | TagFormat::SShort
        | TagFormat::Long | TagFormat::SLong => {
            let (min, max) = integer_range(format);
            let values = tokens(text)
                .map(|t| {
                    let v: i64 = t.parse().map_err(|_| format!("'{t}' is not an integer"))?;
                    if v < min || v > max {
                        return Err(format!("{v} is outside {min}..={max}"));
                    }
                    Ok(v)
                })
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err("expected at least one integer".to_string());
            }
            Ok(TagValue::Integer(values))
        }
        TagFormat::Rational | TagFormat::SRational => {
            let values = tokens(text)
                .map(|t| parse_rational(t, format.is_signed()))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err("expected at least one rational".to_string());
            }
            Ok(TagValue::Rational(values))
        }
        TagFormat::Float | TagFormat::Double => {
            Err("floating point fields cannot be written from text".to_string())
        }
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

fn integer_range(format: TagFormat) -> (i64, i64) {
    match format {
        TagFormat::Byte => (0, u8::MAX as i64),
        TagFormat::SByte => (i8::MIN as i64, i8::MAX as i64),
        TagFormat::Short => (0, u16::MAX as i64),
        TagFormat::SShort => (i16::MIN as i64, i16::MAX as i64),
        TagFormat::SLong => (i32::MIN as i64, i32::MAX as i64),
        _ => (0, u32::MAX as i64),
    }
}

/// Accepts `num/den` or a decimal literal such as `2.8`.
fn parse_rational(token: &str, signed: bool) -> Result<Rational, String> {
    let (min, max) = if signed {
        (i32::MIN as i64, i32::MAX as i64)
    } else {
        (0, u32::MAX as i64)
    };
    let check = |v: i64| -> Result<i64, String> {
        if v < min || v > max {
            Err(format!("{v} does not fit the rational field"))
        } else {
            Ok(v)
        }
    };

    if let Some((n, d)) = token.split_once('/') {
        let num: i64 = n.trim().parse().map_err(|_| format!("'{token}' is not a rational"))?;
        let den: i64 = d.trim().parse().map_err(|_| format!("'{token}' is not a rational"))?;
        if den == 0 {
            return Err(format!("'{token}' has a zero denominator"));
        }
        return Ok(Rational::new(check(num)?, check(den)?));
    }

    let (int_part, frac_part) = token.split_once('.').unwrap_or((token, ""));
    if frac_part.len() > 9 || !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{token}' is not a decimal number"));
    }
    let negative = int_part.starts_with('-');
    let digits = format!("{}{frac_part}", int_part.trim_start_matches(['-', '+']));
    let magnitude: i64 = digits
        .parse()
        .map_err(|_| format!("'{token}' is not a decimal number"))?;
    let mut num = if negative { -magnitude } else { magnitude };
    let mut den = 10i64.pow(frac_part.len() as u32);
    let g = gcd(num.abs(), den);
    if g > 1 {
        num /= g;
        den /= g;
    }
    Ok(Rational::new(check(num)?, check(den)?))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
