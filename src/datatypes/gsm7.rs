// ABOUTME: GSM 03.38 7-bit default alphabet with its extension table and septet unpacking
// ABOUTME: Used for GSM-7 user data and for alphanumeric originating addresses

use crate::codec::CodecError;

/// The 128 characters of the default alphabet, indexed by septet value.
/// Position 0x1B is the escape to the extension table.
const BASIC_TABLE: &str = concat!(
    "@£$¥èéùìòÇ\nØø\rÅå",
    "Δ_ΦΓΛΩΠΨΣΘΞ\u{1B}ÆæßÉ",
    " !\"#¤%&'()*+,-./",
    "0123456789:;<=>?",
    "¡ABCDEFGHIJKLMNO",
    "PQRSTUVWXYZÄÖÑÜ§",
    "¿abcdefghijklmno",
    "pqrstuvwxyzäöñüà",
);

const ESCAPE: u8 = 0x1B;

fn basic_char(septet: u8) -> Option<char> {
    BASIC_TABLE.chars().nth(septet as usize)
}

fn extension_char(septet: u8) -> Option<char> {
    match septet {
        0x0A => Some('\u{0C}'),
        0x14 => Some('^'),
        0x28 => Some('{'),
        0x29 => Some('}'),
        0x2F => Some('\\'),
        0x3C => Some('['),
        0x3D => Some('~'),
        0x3E => Some(']'),
        0x40 => Some('|'),
        0x65 => Some('€'),
        _ => None,
    }
}

/// Unpack `count` septets from packed octets, skipping `skip_bits` leading
/// bits (the fill bits that align text after a user data header).
pub fn unpack_septets(
    octets: &[u8],
    count: usize,
    skip_bits: usize,
) -> Result<Vec<u8>, CodecError> {
    let available = (octets.len() * 8).saturating_sub(skip_bits) / 7;
    if count > available {
        return Err(CodecError::InvalidUserData(format!(
            "{count} septets declared but only {available} present"
        )));
    }

    let septets = (0..count)
        .map(|i| {
            let bit = skip_bits + i * 7;
            let index = bit / 8;
            let shift = bit % 8;
            let low = u16::from(octets[index]);
            let high = octets.get(index + 1).copied().map(u16::from).unwrap_or(0);
            (((high << 8 | low) >> shift) & 0x7F) as u8
        })
        .collect();
    Ok(septets)
}

/// Translate septets into text, resolving escape sequences.
///
/// An escape followed by a value without an extension mapping falls back to
/// the basic character, as 03.38 recommends for receivers.
pub fn decode_septets(septets: &[u8]) -> Result<String, CodecError> {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(septet) = iter.next() {
        if septet == ESCAPE {
            match iter.next() {
                Some(next) => {
                    let c = extension_char(next)
                        .or_else(|| basic_char(next))
                        .ok_or_else(|| invalid_septet(next))?;
                    text.push(c);
                }
                // A trailing escape carries no character
                None => break,
            }
        } else {
            text.push(basic_char(septet).ok_or_else(|| invalid_septet(septet))?);
        }
    }
    Ok(text)
}

/// Unpack and translate in one step
pub fn decode(octets: &[u8], count: usize, skip_bits: usize) -> Result<String, CodecError> {
    decode_septets(&unpack_septets(octets, count, skip_bits)?)
}

fn invalid_septet(septet: u8) -> CodecError {
    CodecError::InvalidUserData(format!("septet {septet:#04x} outside the 7-bit range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hex_decode;

    #[test]
    fn basic_table_has_one_character_per_septet() {
        assert_eq!(BASIC_TABLE.chars().count(), 128);
        assert_eq!(basic_char(0x00), Some('@'));
        assert_eq!(basic_char(0x41), Some('A'));
        assert_eq!(basic_char(0x7F), Some('à'));
    }

    #[test]
    fn unpacks_hello() {
        // "hello" packed into 5 octets
        let octets = hex_decode("E8329BFD06").unwrap();
        assert_eq!(decode(&octets, 5, 0).unwrap(), "hello");
    }

    #[test]
    fn resolves_extension_characters() {
        let septets = [0x1B, 0x65, 0x31, 0x1B, 0x3C, 0x1B, 0x3E];
        assert_eq!(decode_septets(&septets).unwrap(), "€1[]");
    }

    #[test]
    fn rejects_more_septets_than_octets_hold() {
        let octets = [0xE8, 0x32];
        assert!(matches!(
            unpack_septets(&octets, 3, 0),
            Err(CodecError::InvalidUserData(_))
        ));
    }

    #[test]
    fn honours_fill_bits() {
        // One fill bit, then "hi" (0x68, 0x69) packed from bit 1
        let value: u16 = (0x68 << 1) | (0x69 << 8);
        let octets = [(value & 0xFF) as u8, (value >> 8) as u8, 0x00];
        assert_eq!(decode(&octets, 2, 1).unwrap(), "hi");
    }
}
