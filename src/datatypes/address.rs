// ABOUTME: Strongly-typed GSM 03.40 address (TP-OA / TP-DA / SMSC) with type-of-address handling
// ABOUTME: Normalizes user-supplied numbers and encodes/decodes the semi-octet wire form

use crate::codec::{
    get_octet, get_octets, put_semi_octets, semi_octets_to_digits, CodecError,
    MAX_ADDRESS_DIGITS,
};
use crate::datatypes::gsm7;
use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::io::Cursor;

/// The type-of-address octet: extension bit, type of number, numbering plan
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeOfAddress {
    pub ton: TypeOfNumber,
    pub npi: NumericPlanIndicator,
}

impl TypeOfAddress {
    /// International number, ISDN/telephone numbering plan (0x91)
    pub const INTERNATIONAL: TypeOfAddress = TypeOfAddress {
        ton: TypeOfNumber::International,
        npi: NumericPlanIndicator::Isdn,
    };

    /// Unknown type of number, ISDN/telephone numbering plan (0x81)
    pub const UNKNOWN: TypeOfAddress = TypeOfAddress {
        ton: TypeOfNumber::Unknown,
        npi: NumericPlanIndicator::Isdn,
    };

    pub fn from_byte(octet: u8) -> Self {
        let ton = TypeOfNumber::try_from((octet >> 4) & 0x07).unwrap_or(TypeOfNumber::Unknown);
        let npi = NumericPlanIndicator::from(octet & 0x0F);
        TypeOfAddress { ton, npi }
    }

    pub fn to_byte(&self) -> u8 {
        0x80 | ((self.ton as u8) << 4) | (self.npi as u8)
    }
}

/// A phone number (or alphanumeric sender id) as carried in a PDU
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneNumber {
    value: String,
    toa: TypeOfAddress,
}

impl PhoneNumber {
    /// Parse a user-supplied destination.
    ///
    /// A leading `+` selects international numbering; common separators
    /// (space, `-`, `.`, parentheses) are dropped and the remaining digits are
    /// kept in order.
    pub fn parse(input: &str) -> Result<Self, CodecError> {
        let trimmed = input.trim();
        let (toa, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (TypeOfAddress::INTERNATIONAL, rest),
            None => (TypeOfAddress::UNKNOWN, trimmed),
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => {
                    return Err(CodecError::InvalidAddress {
                        address: input.to_string(),
                        reason: "only digits and separators are allowed",
                    })
                }
            }
        }

        if digits.is_empty() {
            return Err(CodecError::InvalidAddress {
                address: input.to_string(),
                reason: "no digits",
            });
        }
        if digits.len() > MAX_ADDRESS_DIGITS {
            return Err(CodecError::InvalidAddress {
                address: input.to_string(),
                reason: "more than 20 digits",
            });
        }

        Ok(PhoneNumber { value: digits, toa })
    }

    /// International number from a country calling code and subscriber number
    pub fn international(country_code: u16, subscriber: u64) -> Result<Self, CodecError> {
        Self::parse(&format!("+{country_code}{subscriber}"))
    }

    /// The digits (or alphanumeric text) without any `+` prefix
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn type_of_address(&self) -> TypeOfAddress {
        self.toa
    }

    pub fn is_international(&self) -> bool {
        self.toa.ton == TypeOfNumber::International
    }

    pub fn is_alphanumeric(&self) -> bool {
        self.toa.ton == TypeOfNumber::Alphanumeric
    }

    /// Encode as a TP address field: digit count, type of address, semi-octets
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.is_alphanumeric() {
            return Err(CodecError::InvalidAddress {
                address: self.value.clone(),
                reason: "alphanumeric destinations cannot be submitted",
            });
        }
        buf.put_u8(self.value.len() as u8);
        buf.put_u8(self.toa.to_byte());
        put_semi_octets(&self.value, buf)
    }

    /// Decode a TP address field, whose length counts semi-octets
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let length = get_octet(buf, "address_length")? as usize;
        if length > MAX_ADDRESS_DIGITS {
            return Err(CodecError::FieldValidation {
                field: "address_length",
                reason: format!("{length} semi-octets exceeds {MAX_ADDRESS_DIGITS}"),
            });
        }
        let toa = TypeOfAddress::from_byte(get_octet(buf, "type_of_address")?);
        let octets = get_octets(buf, length.div_ceil(2), "address")?;

        let value = if toa.ton == TypeOfNumber::Alphanumeric {
            gsm7::decode(&octets, length * 4 / 7, 0)?
        } else {
            semi_octets_to_digits(&octets, length, "address")?
        };
        Ok(PhoneNumber { value, toa })
    }

    /// Encode as an SMSC information block (length in octets, TOA, digits)
    pub fn encode_smsc(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u8(self.smsc_block_length() as u8 - 1);
        buf.put_u8(self.toa.to_byte());
        put_semi_octets(&self.value, buf)
    }

    /// Octets an SMSC information block for this number occupies, length octet included
    pub fn smsc_block_length(&self) -> usize {
        2 + self.value.len().div_ceil(2)
    }

    /// Decode the SMSC information block that prefixes a PDU.
    ///
    /// Its length counts octets including the type-of-address; zero means no
    /// SMSC was included.
    pub fn decode_smsc(buf: &mut Cursor<&[u8]>) -> Result<Option<Self>, CodecError> {
        let length = get_octet(buf, "smsc_length")? as usize;
        if length == 0 {
            return Ok(None);
        }
        if length > MAX_ADDRESS_DIGITS / 2 + 1 {
            return Err(CodecError::FieldValidation {
                field: "smsc_length",
                reason: format!("{length} octets is too long for an SMSC address"),
            });
        }
        let toa = TypeOfAddress::from_byte(get_octet(buf, "smsc_type_of_address")?);
        let octets = get_octets(buf, length - 1, "smsc_address")?;

        // The digit count is implied; a trailing 0xF nibble marks an odd count
        let mut count = octets.len() * 2;
        if octets.last().is_some_and(|last| last >> 4 == 0x0F) {
            count -= 1;
        }
        let value = semi_octets_to_digits(&octets, count, "smsc_address")?;
        Ok(Some(PhoneNumber { value, toa }))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_international() {
            write!(f, "+{}", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}
