// ABOUTME: Strongly-typed GSM 03.38 data coding scheme (TP-DCS) interpreted by coding group
// ABOUTME: Exposes the alphabet, message class and compression flag that govern user data decoding

use std::fmt;

/// Character set carried in the user data
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Alphabet {
    /// GSM 7-bit default alphabet, septets packed into octets
    Gsm7,
    /// 8-bit data, opaque to the codec
    EightBit,
    /// UCS-2 (UTF-16BE on the wire)
    Ucs2,
}

impl Alphabet {
    pub fn name(&self) -> &'static str {
        match self {
            Alphabet::Gsm7 => "GSM 7-bit Default",
            Alphabet::EightBit => "8-bit",
            Alphabet::Ucs2 => "UCS-2",
        }
    }
}

/// Message class for SMS delivery
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MessageClass {
    /// Class 0: flash SMS (displayed immediately, not stored)
    Flash,
    /// Class 1: mobile equipment specific
    MobileEquipment,
    /// Class 2: SIM specific (stored on the SIM card)
    SimSpecific,
    /// Class 3: terminal equipment specific
    TerminalEquipment,
}

impl MessageClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageClass::Flash,
            1 => MessageClass::MobileEquipment,
            2 => MessageClass::SimSpecific,
            _ => MessageClass::TerminalEquipment,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            MessageClass::Flash => 0,
            MessageClass::MobileEquipment => 1,
            MessageClass::SimSpecific => 2,
            MessageClass::TerminalEquipment => 3,
        }
    }

    /// Returns a human-readable description of the message class
    pub fn description(&self) -> &'static str {
        match self {
            MessageClass::Flash => "Flash SMS (immediate display)",
            MessageClass::MobileEquipment => "Mobile Equipment specific",
            MessageClass::SimSpecific => "SIM card storage",
            MessageClass::TerminalEquipment => "Terminal Equipment specific",
        }
    }
}

/// A TP-DCS octet, decoded by coding group.
///
/// The raw value is kept so an unusual scheme survives a decode/encode pass
/// unchanged; the accessors interpret it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataCoding(u8);

impl DataCoding {
    /// GSM 7-bit default alphabet, no class (0x00)
    pub const GSM7: DataCoding = DataCoding(0x00);

    /// UCS-2, no class (0x08)
    pub const UCS2: DataCoding = DataCoding(0x08);

    pub fn from_byte(value: u8) -> Self {
        DataCoding(value)
    }

    /// UCS-2 with an explicit message class
    pub fn ucs2_with_class(class: MessageClass) -> Self {
        DataCoding(0x18 | class.to_bits())
    }

    pub fn to_byte(&self) -> u8 {
        self.0
    }

    pub fn alphabet(&self) -> Alphabet {
        let value = self.0;
        match value >> 4 {
            // General data coding and automatic deletion groups
            0x0..=0x7 => match (value >> 2) & 0x03 {
                0b01 => Alphabet::EightBit,
                0b10 => Alphabet::Ucs2,
                // 0b11 is reserved and treated as the default alphabet
                _ => Alphabet::Gsm7,
            },
            // Message waiting groups
            0xC | 0xD => Alphabet::Gsm7,
            0xE => Alphabet::Ucs2,
            0xF => {
                if value & 0x04 == 0 {
                    Alphabet::Gsm7
                } else {
                    Alphabet::EightBit
                }
            }
            // Reserved coding groups 1000..1011
            _ => Alphabet::Gsm7,
        }
    }

    pub fn message_class(&self) -> Option<MessageClass> {
        let value = self.0;
        match value >> 4 {
            0x0..=0x7 if value & 0x10 != 0 => Some(MessageClass::from_bits(value)),
            0xF => Some(MessageClass::from_bits(value)),
            _ => None,
        }
    }

    /// Compressed user data is flagged only in the general coding groups
    pub fn is_compressed(&self) -> bool {
        self.0 < 0x80 && self.0 & 0x20 != 0
    }

    pub fn is_unicode(&self) -> bool {
        self.alphabet() == Alphabet::Ucs2
    }

    /// Maximum number of characters (or octets for 8-bit) in one message
    pub fn max_single_sms_length(&self) -> usize {
        match self.alphabet() {
            Alphabet::Gsm7 => 160,
            Alphabet::EightBit => 140,
            Alphabet::Ucs2 => 70,
        }
    }
}

impl fmt::Display for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alphabet().name())?;
        if let Some(class) = self.message_class() {
            write!(f, " ({})", class.description())?;
        }
        Ok(())
    }
}

impl fmt::Debug for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataCoding::{:?} (0x{:02X})", self.alphabet(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alphabet_without_class() {
        let dcs = DataCoding::from_byte(0x00);
        assert_eq!(dcs.alphabet(), Alphabet::Gsm7);
        assert_eq!(dcs.message_class(), None);
        assert!(!dcs.is_compressed());
        assert_eq!(dcs, DataCoding::default());
    }

    #[test]
    fn ucs2_schemes() {
        assert!(DataCoding::from_byte(0x08).is_unicode());
        assert!(DataCoding::from_byte(0xE0).is_unicode());
        let flash = DataCoding::ucs2_with_class(MessageClass::Flash);
        assert_eq!(flash.to_byte(), 0x18);
        assert_eq!(flash.message_class(), Some(MessageClass::Flash));
        assert_eq!(flash.max_single_sms_length(), 70);
    }

    #[test]
    fn data_coding_message_class_group() {
        let dcs = DataCoding::from_byte(0xF4);
        assert_eq!(dcs.alphabet(), Alphabet::EightBit);
        assert_eq!(dcs.message_class(), Some(MessageClass::Flash));

        let dcs = DataCoding::from_byte(0xF1);
        assert_eq!(dcs.alphabet(), Alphabet::Gsm7);
        assert_eq!(dcs.message_class(), Some(MessageClass::MobileEquipment));
    }

    #[test]
    fn compressed_flag_in_general_group() {
        assert!(DataCoding::from_byte(0x20).is_compressed());
        assert!(DataCoding::from_byte(0x60).is_compressed());
        assert!(!DataCoding::from_byte(0xF0).is_compressed());
    }

    #[test]
    fn display_includes_class() {
        let dcs = DataCoding::from_byte(0x12);
        assert_eq!(dcs.to_string(), "GSM 7-bit Default (SIM card storage)");
    }
}
