// ABOUTME: SMS-DELIVER TPDU (mobile terminated) as reported by +CMT and +CMGL
// ABOUTME: Decodes sender, service-centre timestamp and GSM-7 or UCS-2 text

use crate::codec::{get_octet, CodecError, Decodable};
use crate::datatypes::{
    DataCoding, FirstOctet, MessageType, PhoneNumber, ServiceCentreTimestamp, UserData,
    UserDataHeader,
};
use std::io::Cursor;

/// An inbound short message in SMS-DELIVER form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverPdu {
    /// SMSC that relayed the message, when the modem includes it
    pub service_centre: Option<PhoneNumber>,
    /// TP-MTI and flags
    pub first_octet: FirstOctet,
    /// TP-OA
    pub sender: PhoneNumber,
    /// TP-PID
    pub protocol_identifier: u8,
    /// TP-DCS
    pub data_coding: DataCoding,
    /// TP-SCTS
    pub timestamp: ServiceCentreTimestamp,
    /// Present when TP-UDHI is set; the header is skipped for the text
    pub header: Option<UserDataHeader>,
    pub text: String,
}

impl Decodable for DeliverPdu {
    fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_centre = PhoneNumber::decode_smsc(buf)?;

        let first_octet = FirstOctet::from_byte(get_octet(buf, "first_octet")?);
        if first_octet.message_type() != MessageType::Deliver {
            return Err(CodecError::UnexpectedMessageType {
                expected: "SMS-DELIVER",
                actual: first_octet.to_byte() & 0x03,
            });
        }

        let sender = PhoneNumber::decode(buf)?;
        let protocol_identifier = get_octet(buf, "protocol_identifier")?;
        let data_coding = DataCoding::from_byte(get_octet(buf, "data_coding")?);
        let timestamp = ServiceCentreTimestamp::decode(buf)?;
        let user_data = UserData::decode(buf, data_coding, first_octet.has_udhi())?;

        Ok(DeliverPdu {
            service_centre,
            first_octet,
            sender,
            protocol_identifier,
            data_coding,
            timestamp,
            header: user_data.header,
            text: user_data.text,
        })
    }
}
