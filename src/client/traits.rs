// ABOUTME: Collaborator-facing modem traits using native async functions
// ABOUTME: Schedulers and API handlers depend on these rather than on the concrete Modem

use crate::client::error::ModemResult;
use crate::client::types::{Response, SendReceipt, StoredMessage};
use crate::command::{DeleteFlag, ExecuteOptions, MessageStatus};
use bytes::Bytes;

/// Command dispatch to a running modem
///
/// Every call takes the transport's exchange lock for its whole duration, so
/// calls from different tasks never interleave on the wire.
pub trait ModemControl {
    /// Send arbitrary bytes and wait for one of the option's keywords
    ///
    /// The bytes are written as given; include the CR/LF terminator for AT
    /// commands.
    async fn send_raw(&self, bytes: Bytes, options: ExecuteOptions) -> ModemResult<Response>;

    /// Send a single-part UCS2 SMS in PDU mode
    ///
    /// Fails with `MessageTooLong` before anything is written if the text
    /// does not fit in one message.
    async fn send_sms(&self, destination: &str, text: &str) -> ModemResult<SendReceipt>;

    /// Issue `AT+RESET` without waiting for the module to come back
    async fn restart(&self) -> ModemResult<()>;
}

/// Access to messages held in modem or SIM storage
pub trait MessageStore {
    /// List stored SMS-DELIVER messages with the given status
    async fn list_messages(&self, status: MessageStatus) -> ModemResult<Vec<StoredMessage>>;

    /// Delete by index, or in bulk depending on `flag`
    async fn delete_message(&self, index: u16, flag: DeleteFlag) -> ModemResult<()>;

    /// Select the memory used for reading, writing and receiving (e.g. `SM`, `ME`)
    async fn select_storage(&self, memory: &str) -> ModemResult<()>;
}
