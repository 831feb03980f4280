// ABOUTME: AT command builders and the per-call execution options (keywords, timeout, retries)
// ABOUTME: Every command renders as text and is sent CR/LF terminated

use crate::frame::{CRLF, CTRL_Z, ESC};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// Default terminating keywords
pub const DEFAULT_KEYWORDS: [&str; 2] = ["OK", "ERROR"];

/// Default time to wait for a keyword
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default bound on reconnect-and-retry attempts after connection faults
pub const DEFAULT_MAX_RETRIES: u32 = 120;

/// The set of keywords that terminate a reply.
///
/// A single string converts to a one-element set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords(Vec<String>);

impl Keywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keywords(keywords.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Keywords::new(DEFAULT_KEYWORDS)
    }
}

impl From<&str> for Keywords {
    fn from(keyword: &str) -> Self {
        Keywords(vec![keyword.to_string()])
    }
}

impl From<String> for Keywords {
    fn from(keyword: String) -> Self {
        Keywords(vec![keyword])
    }
}

impl<const N: usize> From<[&str; N]> for Keywords {
    fn from(keywords: [&str; N]) -> Self {
        Keywords::new(keywords)
    }
}

impl From<Vec<String>> for Keywords {
    fn from(keywords: Vec<String>) -> Self {
        Keywords(keywords)
    }
}

/// How a single command is executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Any of these appearing in the reply ends the wait
    pub keywords: Keywords,
    /// Time allowed for a keyword to appear after the command is written
    pub timeout: Duration,
    /// Reconnect-and-retry attempts allowed after connection faults
    pub max_retries: u32,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            keywords: Keywords::default(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ExecuteOptions {
    pub fn with_keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.keywords = keywords.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Bytes to write plus the options to execute them with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub bytes: Bytes,
    pub options: ExecuteOptions,
}

impl Command {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Command {
            bytes: bytes.into(),
            options: ExecuteOptions::default(),
        }
    }

    /// The PDU that answers the `>` prompt, terminated by Ctrl-Z
    pub fn pdu(pdu_hex: &str) -> Self {
        let mut buf = BytesMut::with_capacity(pdu_hex.len() + 1);
        buf.put_slice(pdu_hex.as_bytes());
        buf.put_u8(CTRL_Z);
        Command::new(buf.freeze())
    }

    /// A lone ESC, which abandons a pending `>` prompt
    pub fn escape() -> Self {
        Command::new(Bytes::from_static(&[ESC]))
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.options.keywords = keywords.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.options.max_retries = max_retries;
        self
    }

    /// Printable form for logs
    pub fn display(&self) -> String {
        String::from_utf8_lossy(&self.bytes).trim_end().escape_debug().to_string()
    }
}

/// Message status filter of AT+CMGL (PDU mode values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    ReceivedUnread = 0,
    ReceivedRead = 1,
    StoredUnsent = 2,
    StoredSent = 3,
    All = 4,
}

impl MessageStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MessageStatus::ReceivedUnread),
            1 => Some(MessageStatus::ReceivedRead),
            2 => Some(MessageStatus::StoredUnsent),
            3 => Some(MessageStatus::StoredSent),
            4 => Some(MessageStatus::All),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Which messages AT+CMGD removes besides the one at `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteFlag {
    /// Only the message at the index
    Index = 0,
    /// All read messages
    Read = 1,
    /// All read and sent messages
    ReadAndSent = 2,
    /// All read, sent and unsent messages
    ReadSentAndUnsent = 3,
    /// Every message in storage
    All = 4,
}

/// New-message indication routing (AT+CNMI=<mode>,<mt>,<bm>,<ds>,<bfr>)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CnmiSettings {
    pub mode: u8,
    pub mt: u8,
    pub bm: u8,
    pub ds: u8,
    pub bfr: u8,
}

impl Default for CnmiSettings {
    /// Route new messages straight to the host as `+CMT:` notifications
    fn default() -> Self {
        CnmiSettings {
            mode: 2,
            mt: 2,
            bm: 0,
            ds: 0,
            bfr: 0,
        }
    }
}

/// AT commands used by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// `AT`
    Attention,
    /// `AT+CPIN?`
    PinStatus,
    /// `AT+CPIN=<pin>`
    EnterPin(String),
    /// `AT+CMGF=<mode>`; 0 is PDU mode
    MessageFormat(u8),
    /// `AT+CSCS="<charset>"`
    CharacterSet(String),
    /// `AT+CNMI=...`
    NewMessageIndication(CnmiSettings),
    /// `AT+CGATT?`
    AttachStatus,
    /// `AT+CGATT=<0|1>`
    SetAttach(bool),
    /// `AT+CMGS=<length>`
    SendMessage { pdu_length: usize },
    /// `AT+CMGL=<stat>`
    ListMessages(MessageStatus),
    /// `AT+CMGD=<index>,<delflag>`
    DeleteMessage { index: u16, flag: DeleteFlag },
    /// `AT+CPMS="<mem>","<mem>","<mem>"`
    PreferredStorage(String),
    /// `AT+RESET`
    Reset,
    /// Any other command, sent verbatim
    Raw(String),
}

impl AtCommand {
    pub fn cpin(pin: Option<&str>) -> Self {
        match pin {
            Some(pin) => AtCommand::EnterPin(pin.to_string()),
            None => AtCommand::PinStatus,
        }
    }

    pub fn cmgf(mode: u8) -> Self {
        AtCommand::MessageFormat(mode)
    }

    pub fn cscs(charset: &str) -> Self {
        AtCommand::CharacterSet(charset.to_string())
    }

    pub fn cgatt(attach: Option<bool>) -> Self {
        match attach {
            Some(attach) => AtCommand::SetAttach(attach),
            None => AtCommand::AttachStatus,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        AtCommand::Raw(text.into())
    }

    /// Wire bytes: the command text followed by CR/LF
    pub fn to_bytes(&self) -> Bytes {
        let text = self.to_string();
        let mut buf = BytesMut::with_capacity(text.len() + CRLF.len());
        buf.put_slice(text.as_bytes());
        buf.put_slice(CRLF);
        buf.freeze()
    }

    /// A [`Command`] with default options
    pub fn into_command(self) -> Command {
        Command::new(self.to_bytes())
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::Attention => write!(f, "AT"),
            AtCommand::PinStatus => write!(f, "AT+CPIN?"),
            AtCommand::EnterPin(pin) => write!(f, "AT+CPIN={pin}"),
            AtCommand::MessageFormat(mode) => write!(f, "AT+CMGF={mode}"),
            AtCommand::CharacterSet(charset) => write!(f, "AT+CSCS=\"{charset}\""),
            AtCommand::NewMessageIndication(c) => {
                write!(f, "AT+CNMI={},{},{},{},{}", c.mode, c.mt, c.bm, c.ds, c.bfr)
            }
            AtCommand::AttachStatus => write!(f, "AT+CGATT?"),
            AtCommand::SetAttach(attach) => write!(f, "AT+CGATT={}", u8::from(*attach)),
            AtCommand::SendMessage { pdu_length } => write!(f, "AT+CMGS={pdu_length}"),
            AtCommand::ListMessages(status) => write!(f, "AT+CMGL={}", status.code()),
            AtCommand::DeleteMessage { index, flag } => {
                write!(f, "AT+CMGD={index},{}", *flag as u8)
            }
            AtCommand::PreferredStorage(mem) => {
                write!(f, "AT+CPMS=\"{mem}\",\"{mem}\",\"{mem}\"")
            }
            AtCommand::Reset => write!(f, "AT+RESET"),
            AtCommand::Raw(text) => write!(f, "{text}"),
        }
    }
}
