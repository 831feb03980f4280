// ABOUTME: TP-UD handling: UCS-2 text encoding, user data header parsing and text decoding
// ABOUTME: Decodes GSM-7 (septet-counted) or UCS-2 (octet-counted) payloads after skipping any UDH

use crate::codec::{get_octet, get_octets, CodecError, MAX_USER_DATA_OCTETS};
use crate::datatypes::data_coding::{Alphabet, DataCoding};
use crate::datatypes::gsm7;
use bytes::Bytes;
use std::io::Cursor;

/// Maximum characters accepted for an outbound message
pub const MAX_MESSAGE_CHARS: usize = 70;

/// Maximum septets in GSM-7 user data
pub const MAX_USER_DATA_SEPTETS: usize = 160;

/// Encode text as UCS-2 (UTF-16BE) user data.
///
/// Rejects more than 70 characters, and payloads that exceed 140 octets once
/// characters outside the BMP are split into surrogate pairs.
pub fn encode_ucs2(text: &str) -> Result<Vec<u8>, CodecError> {
    let chars = text.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(CodecError::MessageTooLong {
            length: chars,
            max: MAX_MESSAGE_CHARS,
            unit: "characters",
        });
    }

    let octets: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
    if octets.len() > MAX_USER_DATA_OCTETS {
        return Err(CodecError::MessageTooLong {
            length: octets.len(),
            max: MAX_USER_DATA_OCTETS,
            unit: "octets",
        });
    }
    Ok(octets)
}

/// Decode UCS-2 (UTF-16BE) octets into text
pub fn decode_ucs2(octets: &[u8]) -> Result<String, CodecError> {
    if octets.len() % 2 != 0 {
        return Err(CodecError::InvalidUserData(format!(
            "odd UCS-2 payload length {}",
            octets.len()
        )));
    }
    let units = octets
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| {
            CodecError::InvalidUserData(format!(
                "unpaired surrogate {:#06x} in UCS-2 text",
                e.unpaired_surrogate()
            ))
        })
}

/// Concatenated-message information carried in a user data header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Concatenation {
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

/// The raw information elements of a user data header (without the UDHL octet)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDataHeader {
    raw: Bytes,
}

impl UserDataHeader {
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Concatenation element (IEI 0x00 with an 8-bit reference or 0x08 with 16-bit)
    pub fn concatenation(&self) -> Option<Concatenation> {
        let mut rest = &self.raw[..];
        while rest.len() >= 2 {
            let iei = rest[0];
            let length = rest[1] as usize;
            let data = rest.get(2..2 + length)?;
            match (iei, data) {
                (0x00, [reference, total, sequence]) => {
                    return Some(Concatenation {
                        reference: u16::from(*reference),
                        total: *total,
                        sequence: *sequence,
                    });
                }
                (0x08, [high, low, total, sequence]) => {
                    return Some(Concatenation {
                        reference: u16::from_be_bytes([*high, *low]),
                        total: *total,
                        sequence: *sequence,
                    });
                }
                _ => rest = &rest[2 + length..],
            }
        }
        None
    }
}

/// Decoded TP-UD: the optional header and the message text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserData {
    pub header: Option<UserDataHeader>,
    pub text: String,
}

impl UserData {
    /// Read TP-UDL and TP-UD from the buffer and decode the text.
    pub fn decode(
        buf: &mut Cursor<&[u8]>,
        coding: DataCoding,
        has_header: bool,
    ) -> Result<Self, CodecError> {
        let udl = get_octet(buf, "user_data_length")? as usize;

        if coding.is_compressed() {
            return Err(CodecError::UnsupportedDataCoding(coding.to_byte()));
        }

        match coding.alphabet() {
            Alphabet::Gsm7 => {
                if udl > MAX_USER_DATA_SEPTETS {
                    return Err(CodecError::FieldValidation {
                        field: "user_data_length",
                        reason: format!("{udl} septets exceeds {MAX_USER_DATA_SEPTETS}"),
                    });
                }
                let octets = get_octets(buf, (udl * 7).div_ceil(8), "user_data")?;
                let (header, header_bits) = if has_header {
                    let (header, consumed) = split_header(&octets)?;
                    // Fill bits pad the header out to the next septet boundary
                    let bits = consumed * 8;
                    (Some(header), bits.div_ceil(7) * 7)
                } else {
                    (None, 0)
                };
                let septets = udl.checked_sub(header_bits / 7).ok_or_else(|| {
                    CodecError::InvalidUserData("header longer than user data".to_string())
                })?;
                let text = gsm7::decode(&octets, septets, header_bits)?;
                Ok(UserData { header, text })
            }
            Alphabet::Ucs2 => {
                if udl > MAX_USER_DATA_OCTETS {
                    return Err(CodecError::FieldValidation {
                        field: "user_data_length",
                        reason: format!("{udl} octets exceeds {MAX_USER_DATA_OCTETS}"),
                    });
                }
                let octets = get_octets(buf, udl, "user_data")?;
                let (header, consumed) = if has_header {
                    let (header, consumed) = split_header(&octets)?;
                    (Some(header), consumed)
                } else {
                    (None, 0)
                };
                let text = decode_ucs2(&octets[consumed..])?;
                Ok(UserData { header, text })
            }
            Alphabet::EightBit => Err(CodecError::UnsupportedDataCoding(coding.to_byte())),
        }
    }
}

/// Split the UDH off the front of the user data, returning it and the octets
/// consumed including the UDHL octet itself
fn split_header(octets: &Bytes) -> Result<(UserDataHeader, usize), CodecError> {
    let udhl = *octets.first().ok_or_else(|| {
        CodecError::InvalidUserData("header indicated but user data is empty".to_string())
    })? as usize;
    if udhl + 1 > octets.len() {
        return Err(CodecError::InvalidUserData(format!(
            "header length {udhl} exceeds user data of {} octets",
            octets.len()
        )));
    }
    let header = UserDataHeader {
        raw: octets.slice(1..1 + udhl),
    };
    Ok((header, udhl + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{hex_decode, hex_encode};

    fn decode_hex(hex: &str, dcs: u8, has_header: bool) -> Result<UserData, CodecError> {
        let octets = hex_decode(hex).unwrap();
        UserData::decode(
            &mut Cursor::new(octets.as_slice()),
            DataCoding::from_byte(dcs),
            has_header,
        )
    }

    #[test]
    fn ucs2_encodes_big_endian() {
        assert_eq!(hex_encode(&encode_ucs2("Hello").unwrap()), "00480065006C006C006F");
        assert_eq!(hex_encode(&encode_ucs2("你好").unwrap()), "4F60597D");
    }

    #[test]
    fn seventy_characters_accepted_seventy_one_rejected() {
        assert_eq!(encode_ucs2(&"a".repeat(70)).unwrap().len(), 140);
        assert_eq!(
            encode_ucs2(&"a".repeat(71)),
            Err(CodecError::MessageTooLong {
                length: 71,
                max: 70,
                unit: "characters"
            })
        );
    }

    #[test]
    fn astral_characters_count_against_octet_limit() {
        let text = "😀".repeat(36);
        assert!(matches!(
            encode_ucs2(&text),
            Err(CodecError::MessageTooLong { unit: "octets", .. })
        ));
    }

    #[test]
    fn ucs2_decode_rejects_unpaired_surrogate() {
        assert!(matches!(
            decode_ucs2(&[0xD8, 0x3D]),
            Err(CodecError::InvalidUserData(_))
        ));
        assert_eq!(decode_ucs2(&[0xD8, 0x3D, 0xDE, 0x00]).unwrap(), "😀");
    }

    #[test]
    fn ucs2_with_header() {
        let ud = decode_hex("0A0500030A02014F60597D", 0x08, true).unwrap();
        assert_eq!(ud.text, "你好");
        let concat = ud.header.unwrap().concatenation().unwrap();
        assert_eq!(
            concat,
            Concatenation {
                reference: 0x0A,
                total: 2,
                sequence: 1
            }
        );
    }

    #[test]
    fn gsm7_plain() {
        let ud = decode_hex("05E8329BFD06", 0x00, false).unwrap();
        assert_eq!(ud.text, "hello");
        assert!(ud.header.is_none());
    }

    #[test]
    fn gsm7_with_header_skips_fill_bits() {
        // 6-octet header (48 bits) plus one fill bit, then "hi"
        let value: u16 = (0x68 << 1) | (0x69 << 8);
        let hex = format!(
            "09050003010201{:02X}{:02X}",
            value & 0xFF,
            value >> 8
        );
        let ud = decode_hex(&hex, 0x00, true).unwrap();
        assert_eq!(ud.text, "hi");
        assert!(ud.header.is_some());
    }

    #[test]
    fn eight_bit_is_unsupported() {
        assert_eq!(
            decode_hex("02AABB", 0x04, false),
            Err(CodecError::UnsupportedDataCoding(0x04))
        );
    }

    #[test]
    fn length_disagreeing_with_data() {
        assert!(matches!(
            decode_hex("08004800", 0x08, false),
            Err(CodecError::Incomplete { .. })
        ));
    }
}
