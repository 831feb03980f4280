// ABOUTME: Modem driver error types covering bring-up, transport faults and codec failures
// ABOUTME: Codec errors convert automatically so PDU failures propagate with `?`

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

/// Error type for modem operations
#[derive(Debug, Error)]
pub enum ModemError {
    /// Outbound text does not fit in a single message
    #[error("Message too long: {length} {unit} (max {max})")]
    MessageTooLong {
        length: usize,
        max: usize,
        unit: &'static str,
    },

    /// A PDU could not be built or parsed
    #[error("Malformed PDU: {0}")]
    MalformedPdu(CodecError),

    /// The module did not answer `AT` with `OK`
    #[error("Module did not respond to AT")]
    ModuleUnresponsive,

    /// `AT+CPIN?` did not report READY
    #[error("SIM not ready")]
    SimNotReady,

    /// A configuration command during bring-up was not accepted
    #[error("Bring-up failed at {step}")]
    BringUpFailed { step: String },

    /// The network attach wait ended without an attach
    #[error("Not attached to the network")]
    NetworkNotAttached,

    /// No terminating keyword arrived in time
    #[error("Timed out waiting for the modem")]
    TransportTimeout { partial: Option<String> },

    /// Connection faults persisted through every retry
    #[error("Transport failed after {attempts} attempts: {source}")]
    TransportExhausted {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The serial device could not be opened
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// The modem answered with ERROR
    #[error("Modem rejected command: {0}")]
    Rejected(String),

    /// The transport task has stopped
    #[error("Transport closed")]
    Closed,

    /// Stopped through a cancellation token
    #[error("Cancelled")]
    Cancelled,
}

/// Result type alias for modem operations
pub type ModemResult<T> = Result<T, ModemError>;

impl From<CodecError> for ModemError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MessageTooLong { length, max, unit } => {
                ModemError::MessageTooLong { length, max, unit }
            }
            other => ModemError::MalformedPdu(other),
        }
    }
}
