// GSM 03.40 PDU codec - separates wire-level parsing/encoding from the domain models
//
// Each PDU type implements Encodable/Decodable rather than keeping all the
// parsing logic in one monolithic function. This module holds the shared
// error type, the traits, and the small octet/semi-octet/hex helpers the
// datatypes build on.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum number of semi-octet digits in a TP address field
pub const MAX_ADDRESS_DIGITS: usize = 20;

/// Maximum length of the TP-User-Data field in octets
pub const MAX_USER_DATA_OCTETS: usize = 140;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated PDU while reading {field}: need {needed} octets, {remaining} remaining")]
    Incomplete {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("Invalid hex in PDU: {0}")]
    InvalidHex(String),

    #[error("Message too long: {length} {unit} (max {max})")]
    MessageTooLong {
        length: usize,
        max: usize,
        unit: &'static str,
    },

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    #[error("Invalid semi-octet {value:#x} in field '{field}'")]
    InvalidSemiOctet { field: &'static str, value: u8 },

    #[error("Unexpected message type indicator: expected {expected}, got {actual:#04b}")]
    UnexpectedMessageType { expected: &'static str, actual: u8 },

    #[error("Unsupported data coding scheme: {0:#04x}")]
    UnsupportedDataCoding(u8),

    #[error("Invalid user data: {0}")]
    InvalidUserData(String),

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("{0} unexpected octets after end of PDU")]
    TrailingData(usize),
}

/// Trait for PDUs that can be encoded to octets
pub trait Encodable {
    /// Encode this PDU to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(176);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode as the upper-case hex string that PDU-mode AT commands carry
    fn to_hex(&self) -> Result<String, CodecError> {
        Ok(hex_encode(&self.to_bytes()?))
    }
}

/// Trait for PDUs that can be decoded from octets
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer
    fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Decode a complete PDU from its hex representation.
    ///
    /// The whole input must be consumed; leftover octets mean one of the
    /// length fields disagreed with the data.
    fn from_hex(hex: &str) -> Result<Self, CodecError> {
        let octets = hex_decode(hex)?;
        let mut buf = Cursor::new(octets.as_slice());
        let pdu = Self::decode(&mut buf)?;
        if buf.has_remaining() {
            return Err(CodecError::TrailingData(buf.remaining()));
        }
        Ok(pdu)
    }
}

/// Upper-case hex encoding, two characters per octet
pub fn hex_encode(octets: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(octets.len() * 2);
    for &octet in octets {
        out.push(DIGITS[(octet >> 4) as usize] as char);
        out.push(DIGITS[(octet & 0x0F) as usize] as char);
    }
    out
}

/// Decode a hex string (either case) into octets
pub fn hex_decode(hex: &str) -> Result<Vec<u8>, CodecError> {
    let hex = hex.trim();
    if hex.is_empty() {
        return Err(CodecError::InvalidHex("empty input".to_string()));
    }
    if hex.len() % 2 != 0 {
        return Err(CodecError::InvalidHex(format!(
            "odd number of hex digits ({})",
            hex.len()
        )));
    }

    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = hex_value(pair[0])?;
            let low = hex_value(pair[1])?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn hex_value(digit: u8) -> Result<u8, CodecError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(CodecError::InvalidHex(format!(
            "unexpected character '{}'",
            other as char
        ))),
    }
}

/// Read one octet, reporting which field ran out of data
pub fn get_octet(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u8, CodecError> {
    ensure_remaining(buf, 1, field)?;
    Ok(buf.get_u8())
}

/// Read `count` octets, reporting which field ran out of data
pub fn get_octets(
    buf: &mut Cursor<&[u8]>,
    count: usize,
    field: &'static str,
) -> Result<Bytes, CodecError> {
    ensure_remaining(buf, count, field)?;
    Ok(buf.copy_to_bytes(count))
}

fn ensure_remaining(
    buf: &Cursor<&[u8]>,
    needed: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Incomplete {
            field,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Swap the nibbles of a semi-octet encoded value and read it as two BCD digits
pub fn swapped_bcd(octet: u8, field: &'static str) -> Result<u8, CodecError> {
    let low = octet & 0x0F;
    let high = octet >> 4;
    if low > 9 || high > 9 {
        return Err(CodecError::InvalidSemiOctet {
            field,
            value: octet,
        });
    }
    Ok(low * 10 + high)
}

/// Write address digits as swapped semi-octets, padding an odd count with 0xF
pub fn put_semi_octets(digits: &str, buf: &mut BytesMut) -> Result<(), CodecError> {
    let nibbles = digits
        .chars()
        .map(|c| digit_to_nibble(c).ok_or(CodecError::InvalidAddress {
            address: digits.to_string(),
            reason: "address digits must be 0-9, '*' or '#'",
        }))
        .collect::<Result<Vec<u8>, CodecError>>()?;

    for pair in nibbles.chunks(2) {
        let low = pair[0];
        let high = pair.get(1).copied().unwrap_or(0x0F);
        buf.put_u8((high << 4) | low);
    }
    Ok(())
}

/// Read `count` swapped semi-octet digits from `octets`
pub fn semi_octets_to_digits(
    octets: &[u8],
    count: usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let mut digits = String::with_capacity(count);
    for (i, octet) in octets.iter().enumerate() {
        for (j, nibble) in [octet & 0x0F, octet >> 4].into_iter().enumerate() {
            let position = i * 2 + j;
            if position >= count {
                // Only the final high nibble of an odd-length field may be filler
                if nibble != 0x0F {
                    return Err(CodecError::InvalidSemiOctet {
                        field,
                        value: *octet,
                    });
                }
                continue;
            }
            let digit = nibble_to_digit(nibble).ok_or(CodecError::InvalidSemiOctet {
                field,
                value: *octet,
            })?;
            digits.push(digit);
        }
    }
    Ok(digits)
}

fn digit_to_nibble(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(c as u8 - b'0'),
        '*' => Some(0x0A),
        '#' => Some(0x0B),
        _ => None,
    }
}

fn nibble_to_digit(nibble: u8) -> Option<char> {
    match nibble {
        0..=9 => Some((b'0' + nibble) as char),
        0x0A => Some('*'),
        0x0B => Some('#'),
        0x0C => Some('a'),
        0x0D => Some('b'),
        0x0E => Some('c'),
        _ => None,
    }
}
