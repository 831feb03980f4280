// ABOUTME: Strongly-typed first octet of an SMS-SUBMIT / SMS-DELIVER TPDU
// ABOUTME: Carries the message type indicator and the per-message flag bits

use num_enum::TryFromPrimitive;
use std::fmt;

/// TP-MTI, bits 1-0 of the first octet (mobile-station view)
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageType {
    Deliver = 0b00,
    Submit = 0b01,
    StatusReport = 0b10,
    Reserved = 0b11,
}

/// TP-VPF, bits 4-3 of an SMS-SUBMIT first octet
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValidityPeriodFormat {
    NotPresent = 0b00,
    Enhanced = 0b01,
    Relative = 0b10,
    Absolute = 0b11,
}

impl ValidityPeriodFormat {
    /// Octets the TP-VP field occupies
    pub fn field_length(&self) -> usize {
        match self {
            ValidityPeriodFormat::NotPresent => 0,
            ValidityPeriodFormat::Relative => 1,
            ValidityPeriodFormat::Enhanced | ValidityPeriodFormat::Absolute => 7,
        }
    }
}

const MTI_MASK: u8 = 0b0000_0011;
const MMS_OR_RD: u8 = 0b0000_0100;
const VPF_SHIFT: u8 = 3;
const SRI_OR_SRR: u8 = 0b0010_0000;
const UDHI: u8 = 0b0100_0000;
const REPLY_PATH: u8 = 0b1000_0000;

/// The first octet of a TPDU.
///
/// Bit 2 means "more messages to send" (inverted) in a DELIVER and "reject
/// duplicates" in a SUBMIT; bit 5 is the status report indication/request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FirstOctet(u8);

impl FirstOctet {
    /// SMS-SUBMIT without validity period, header or reply path (0x01)
    pub const SUBMIT: FirstOctet = FirstOctet(MessageType::Submit as u8);

    pub fn from_byte(value: u8) -> Self {
        FirstOctet(value)
    }

    pub fn to_byte(&self) -> u8 {
        self.0
    }

    pub fn message_type(&self) -> MessageType {
        match MessageType::try_from(self.0 & MTI_MASK) {
            Ok(mti) => mti,
            Err(_) => MessageType::Reserved,
        }
    }

    pub fn validity_period_format(&self) -> ValidityPeriodFormat {
        match ValidityPeriodFormat::try_from((self.0 >> VPF_SHIFT) & 0b11) {
            Ok(vpf) => vpf,
            Err(_) => ValidityPeriodFormat::NotPresent,
        }
    }

    /// SMS-DELIVER: the service centre has no further messages waiting
    pub fn no_more_messages(&self) -> bool {
        self.0 & MMS_OR_RD != 0
    }

    pub fn has_status_report(&self) -> bool {
        self.0 & SRI_OR_SRR != 0
    }

    /// The user data begins with a user data header
    pub fn has_udhi(&self) -> bool {
        self.0 & UDHI != 0
    }

    pub fn has_reply_path(&self) -> bool {
        self.0 & REPLY_PATH != 0
    }

    pub fn with_udhi(self) -> Self {
        FirstOctet(self.0 | UDHI)
    }

    pub fn with_status_report_request(self) -> Self {
        FirstOctet(self.0 | SRI_OR_SRR)
    }
}

impl fmt::Debug for FirstOctet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstOctet")
            .field("raw", &format_args!("0x{:02X}", self.0))
            .field("message_type", &self.message_type())
            .field("udhi", &self.has_udhi())
            .finish()
    }
}
