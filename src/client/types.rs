// ABOUTME: Value types exchanged with modem callers: command responses, inbound SMS and receipts
// ABOUTME: Also parses the +CMGS reference and +CMGL listings out of raw response text

use crate::client::error::{ModemError, ModemResult};
use crate::command::MessageStatus;
use crate::datatypes::{Concatenation, DataCoding, ServiceCentreTimestamp};
use crate::pdu::{decode_pdu, DeliverPdu};
use tracing::warn;

/// Keyword that marks a rejected command
pub const ERROR_KEYWORD: &str = "ERROR";

/// Outcome of one command exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A keyword appeared; `text` is everything up to the end of its line
    Matched { keyword: String, text: String },
    /// No keyword within the timeout
    TimedOut { partial: Option<String> },
}

impl Response {
    pub fn is_matched(&self) -> bool {
        matches!(self, Response::Matched { .. })
    }

    /// Matched on `OK`
    pub fn is_ok(&self) -> bool {
        self.keyword() == Some("OK")
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            Response::Matched { keyword, .. } => Some(keyword),
            Response::TimedOut { .. } => None,
        }
    }

    /// Response text, or whatever arrived before the timeout
    pub fn text(&self) -> &str {
        match self {
            Response::Matched { text, .. } => text,
            Response::TimedOut { partial } => partial.as_deref().unwrap_or(""),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text().contains(needle)
    }

    /// Treat `ERROR` as [`ModemError::Rejected`] and a timeout as
    /// [`ModemError::TransportTimeout`]
    pub fn into_result(self) -> ModemResult<String> {
        match self {
            Response::Matched { keyword, text } if keyword == ERROR_KEYWORD => {
                Err(ModemError::Rejected(text.trim().to_string()))
            }
            Response::Matched { text, .. } => Ok(text),
            Response::TimedOut { partial } => Err(ModemError::TransportTimeout { partial }),
        }
    }
}

/// A received short message, as handed to [`SmsHandler`](crate::client::SmsHandler)s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSms {
    /// Originating address; `+` prefixed when international, text for alphanumeric senders
    pub sender: String,
    pub timestamp: ServiceCentreTimestamp,
    pub text: String,
    pub service_centre: Option<String>,
    pub data_coding: DataCoding,
    /// Set for one part of a multi-part message; parts are not reassembled
    pub concatenation: Option<Concatenation>,
}

impl From<DeliverPdu> for InboundSms {
    fn from(pdu: DeliverPdu) -> Self {
        InboundSms {
            sender: pdu.sender.to_string(),
            timestamp: pdu.timestamp,
            service_centre: pdu.service_centre.map(|smsc| smsc.to_string()),
            data_coding: pdu.data_coding,
            concatenation: pdu.header.as_ref().and_then(|h| h.concatenation()),
            text: pdu.text,
        }
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Message reference from `+CMGS: <mr>`, when the modem reported one
    pub reference: Option<u8>,
    /// Length passed to AT+CMGS
    pub pdu_length: usize,
}

/// A message held in modem or SIM storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub index: u16,
    pub status: MessageStatus,
    pub message: InboundSms,
}

/// Message reference from a `+CMGS: <mr>` line
pub fn parse_message_reference(text: &str) -> Option<u8> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("+CMGS:"))
        .and_then(|rest| rest.split(',').next())
        .and_then(|mr| mr.trim().parse().ok())
}

/// Parse an AT+CMGL listing: `+CMGL: <index>,<stat>,[<alpha>],<length>`
/// headers, each followed by its PDU line.
///
/// Entries that do not decode as SMS-DELIVER (sent or unsent drafts, damaged
/// records) are logged and skipped.
pub fn parse_listing(text: &str) -> Vec<StoredMessage> {
    let mut messages = Vec::new();
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    while let Some(line) = lines.next() {
        let Some(header) = line.strip_prefix("+CMGL:") else {
            continue;
        };
        let mut fields = header.split(',').map(str::trim);
        let index = fields.next().and_then(|f| f.parse::<u16>().ok());
        let status = fields
            .next()
            .and_then(|f| f.parse::<u8>().ok())
            .and_then(MessageStatus::from_code);
        let (Some(index), Some(status)) = (index, status) else {
            warn!(header = line, "unparseable +CMGL header");
            continue;
        };
        let Some(pdu) = lines.next() else {
            warn!(index, "+CMGL entry without PDU line");
            break;
        };

        match decode_pdu(pdu) {
            Ok(deliver) => messages.push(StoredMessage {
                index,
                status,
                message: deliver.into(),
            }),
            Err(e) => warn!(index, error = %e, "skipping stored message"),
        }
    }
    messages
}
