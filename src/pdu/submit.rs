// ABOUTME: SMS-SUBMIT TPDU (mobile originated) with UCS-2 user data
// ABOUTME: Encodes what AT+CMGS carries in PDU mode and parses it back for logging

use crate::codec::{get_octet, get_octets, hex_encode, CodecError, Decodable, Encodable};
use crate::datatypes::{
    encode_ucs2, Alphabet, DataCoding, FirstOctet, MessageType, PhoneNumber, UserData,
};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// An outbound short message in SMS-SUBMIT form.
///
/// `new` fills in the fixed fields used for every message this driver sends:
/// no SMSC (the SIM default is used), first octet 0x01, message reference 0
/// (the modem assigns one), protocol identifier 0 and UCS-2 coding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitPdu {
    /// SMSC override; `None` encodes the single `00` octet
    pub service_centre: Option<PhoneNumber>,
    /// TP-MTI and flags
    pub first_octet: FirstOctet,
    /// TP-MR
    pub message_reference: u8,
    /// TP-DA
    pub destination: PhoneNumber,
    /// TP-PID
    pub protocol_identifier: u8,
    /// TP-DCS; only UCS-2 can be encoded
    pub data_coding: DataCoding,
    pub text: String,
}

impl SubmitPdu {
    pub fn new(destination: PhoneNumber, text: impl Into<String>) -> Self {
        SubmitPdu {
            service_centre: None,
            first_octet: FirstOctet::SUBMIT,
            message_reference: 0,
            destination,
            protocol_identifier: 0,
            data_coding: DataCoding::UCS2,
            text: text.into(),
        }
    }

    /// Encode and return the hex string together with the length AT+CMGS
    /// expects: the octet count excluding the SMSC information block.
    pub fn encode_hex(&self) -> Result<(String, usize), CodecError> {
        let mut buf = BytesMut::with_capacity(176);
        self.encode(&mut buf)?;
        let smsc_octets = self
            .service_centre
            .as_ref()
            .map_or(1, PhoneNumber::smsc_block_length);
        Ok((hex_encode(&buf), buf.len() - smsc_octets))
    }
}

impl Encodable for SubmitPdu {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.data_coding.alphabet() != Alphabet::Ucs2 {
            return Err(CodecError::UnsupportedDataCoding(self.data_coding.to_byte()));
        }
        if self.first_octet.has_udhi() {
            return Err(CodecError::FieldValidation {
                field: "first_octet",
                reason: "user data headers are not encoded".to_string(),
            });
        }
        if self.first_octet.validity_period_format().field_length() != 0 {
            return Err(CodecError::FieldValidation {
                field: "first_octet",
                reason: "validity period is not encoded".to_string(),
            });
        }

        // Validate the text before anything is written
        let user_data = encode_ucs2(&self.text)?;

        match &self.service_centre {
            Some(smsc) => smsc.encode_smsc(buf)?,
            None => buf.put_u8(0x00),
        }
        buf.put_u8(self.first_octet.to_byte());
        buf.put_u8(self.message_reference);
        self.destination.encode(buf)?;
        buf.put_u8(self.protocol_identifier);
        buf.put_u8(self.data_coding.to_byte());
        buf.put_u8(user_data.len() as u8);
        buf.put_slice(&user_data);
        Ok(())
    }
}

impl Decodable for SubmitPdu {
    fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_centre = PhoneNumber::decode_smsc(buf)?;

        let first_octet = FirstOctet::from_byte(get_octet(buf, "first_octet")?);
        if first_octet.message_type() != MessageType::Submit {
            return Err(CodecError::UnexpectedMessageType {
                expected: "SMS-SUBMIT",
                actual: first_octet.to_byte() & 0x03,
            });
        }

        let message_reference = get_octet(buf, "message_reference")?;
        let destination = PhoneNumber::decode(buf)?;
        let protocol_identifier = get_octet(buf, "protocol_identifier")?;
        let data_coding = DataCoding::from_byte(get_octet(buf, "data_coding")?);

        // The validity period is skipped; it is never set on outbound messages
        let vp_length = first_octet.validity_period_format().field_length();
        get_octets(buf, vp_length, "validity_period")?;

        let user_data = UserData::decode(buf, data_coding, first_octet.has_udhi())?;

        Ok(SubmitPdu {
            service_centre,
            first_octet,
            message_reference,
            destination,
            protocol_identifier,
            data_coding,
            text: user_data.text,
        })
    }
}
