//! GSM 03.40 transfer-layer PDUs.
//!
//! Outbound messages are built as [`SubmitPdu`] and sent as the hex string
//! that follows `AT+CMGS=<length>`. Inbound messages arrive as [`DeliverPdu`]
//! hex lines after `+CMT:` notifications or `+CMGL:` listing headers.

mod deliver;
mod submit;

pub use deliver::DeliverPdu;
pub use submit::SubmitPdu;

use crate::codec::{CodecError, Decodable};
use crate::datatypes::PhoneNumber;

/// Encode `text` for `destination` as a UCS-2 SMS-SUBMIT.
///
/// Returns the upper-case hex PDU and the length to pass to `AT+CMGS`, which
/// excludes the leading SMSC octet.
pub fn encode_pdu(destination: &str, text: &str) -> Result<(String, usize), CodecError> {
    let destination = PhoneNumber::parse(destination)?;
    SubmitPdu::new(destination, text).encode_hex()
}

/// Decode the hex line of an SMS-DELIVER as reported by the modem
pub fn decode_pdu(raw: &str) -> Result<DeliverPdu, CodecError> {
    DeliverPdu::from_hex(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_pdu_reports_length_without_smsc_octet() {
        let (hex, length) = encode_pdu("+8613800138000", "Hello").unwrap();
        assert_eq!(length, hex.len() / 2 - 1);
        assert!(hex.starts_with("0001000D91"));
    }

    #[test]
    fn encode_pdu_rejects_bad_destination() {
        assert!(matches!(
            encode_pdu("call me", "Hello"),
            Err(CodecError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn decode_pdu_trims_line_endings() {
        let pdu = decode_pdu("0891683108200805F0040D91683119325476F8000842017121436523044F60597D\r\n")
            .unwrap();
        assert_eq!(pdu.text, "你好");
    }
}
