// ABOUTME: The Modem facade: starts transport, bring-up and listener, then dispatches commands
// ABOUTME: Implements ModemControl and MessageStore over the shared Transport

use crate::client::bringup::{bring_up, AttachStatus, BringUpConfig};
use crate::client::error::{ModemError, ModemResult};
use crate::client::listener::{Listener, SmsHandler};
use crate::client::traits::{MessageStore, ModemControl};
use crate::client::transport::{Transport, TransportConfig};
use crate::client::types::{parse_listing, parse_message_reference, Response, SendReceipt, StoredMessage};
use crate::command::{AtCommand, Command, DeleteFlag, ExecuteOptions, MessageStatus};
use crate::connection::Connector;
use crate::pdu::encode_pdu;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for the `>` prompt after AT+CMGS
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(3);

/// Wait for `+CMGS:` after the PDU
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for a full AT+CMGL listing
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);

const ESCAPE_TIMEOUT: Duration = Duration::from_secs(1);

/// Settings for [`Modem::start`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModemConfig {
    pub transport: TransportConfig,
    pub bring_up: BringUpConfig,
}

/// A started modem.
#[derive(Debug)]
pub struct Modem {
    transport: Arc<Transport>,
    listener: Option<Listener>,
    attach: Option<AttachStatus>,
}

impl Modem {
    /// Open the connection, run bring-up and start the listener.
    ///
    /// Nothing is left running if bring-up fails. Cancelling `cancel` stops
    /// the attach wait and later the listener.
    pub async fn start<C, H>(
        connector: C,
        config: ModemConfig,
        handler: H,
        cancel: CancellationToken,
    ) -> ModemResult<Modem>
    where
        C: Connector,
        H: SmsHandler,
    {
        let (transport, feed) = Transport::open(connector, config.transport).await?;

        let attach = match bring_up(&transport, &config.bring_up, &cancel).await {
            Ok(AttachStatus::StillWaiting { attempts }) if !config.bring_up.tolerate_unattached => {
                warn!(attempts, "giving up on network attach");
                transport.shutdown().await;
                return Err(ModemError::NetworkNotAttached);
            }
            Ok(status) => status,
            Err(e) => {
                transport.shutdown().await;
                return Err(e);
            }
        };

        let listener = Listener::spawn(feed, handler, cancel.child_token());
        info!(?attach, "modem ready");
        Ok(Modem {
            transport: Arc::new(transport),
            listener: Some(listener),
            attach: Some(attach),
        })
    }

    /// Facade over an already open transport, without bring-up or listener
    pub fn new(transport: Arc<Transport>) -> Modem {
        Modem {
            transport,
            listener: None,
            attach: None,
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Outcome of the attach wait, when this modem ran bring-up
    pub fn attach_status(&self) -> Option<AttachStatus> {
        self.attach
    }

    /// Stop the listener, then the transport
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop().await;
        }
        self.transport.shutdown().await;
        info!("modem stopped");
    }
}

impl ModemControl for Modem {
    async fn send_raw(&self, bytes: Bytes, options: ExecuteOptions) -> ModemResult<Response> {
        self.transport
            .execute(Command::new(bytes).with_options(options))
            .await
    }

    async fn send_sms(&self, destination: &str, text: &str) -> ModemResult<SendReceipt> {
        let (pdu, pdu_length) = encode_pdu(destination, text)?;
        info!(destination, pdu_length, "sending SMS");

        let exchange = self.transport.exchange().await;

        exchange
            .execute(AtCommand::cmgf(0).into_command())
            .await?
            .into_result()?;

        // A fault inside the prompt dialogue cannot be retried step by step
        let prompt = exchange
            .execute(
                AtCommand::SendMessage { pdu_length }
                    .into_command()
                    .with_keywords([">", "ERROR"])
                    .with_timeout(PROMPT_TIMEOUT)
                    .with_max_retries(0),
            )
            .await?;
        if let Response::TimedOut { partial } = prompt {
            warn!(destination, "no prompt from the modem, cancelling");
            if let Err(e) = exchange
                .execute(Command::escape().with_timeout(ESCAPE_TIMEOUT).with_max_retries(0))
                .await
            {
                warn!(error = %e, "failed to cancel the prompt");
            }
            return Err(ModemError::TransportTimeout { partial });
        }
        prompt.into_result()?;

        let text = exchange
            .execute(
                Command::pdu(&pdu)
                    .with_keywords(["+CMGS:", "ERROR"])
                    .with_timeout(SUBMIT_TIMEOUT)
                    .with_max_retries(0),
            )
            .await?
            .into_result()?;

        let reference = parse_message_reference(&text);
        info!(destination, ?reference, "SMS accepted");
        Ok(SendReceipt {
            reference,
            pdu_length,
        })
    }

    async fn restart(&self) -> ModemResult<()> {
        info!("restarting module");
        let response = self
            .transport
            .execute(AtCommand::Reset.into_command().with_max_retries(0))
            .await?;
        if !response.is_matched() {
            info!("no reply to reset, module is probably rebooting");
        }
        Ok(())
    }
}

impl MessageStore for Modem {
    async fn list_messages(&self, status: MessageStatus) -> ModemResult<Vec<StoredMessage>> {
        let text = self
            .transport
            .execute(
                AtCommand::ListMessages(status)
                    .into_command()
                    .with_timeout(LIST_TIMEOUT),
            )
            .await?
            .into_result()?;
        Ok(parse_listing(&text))
    }

    async fn delete_message(&self, index: u16, flag: DeleteFlag) -> ModemResult<()> {
        self.transport
            .execute(AtCommand::DeleteMessage { index, flag }.into_command())
            .await?
            .into_result()?;
        Ok(())
    }

    async fn select_storage(&self, memory: &str) -> ModemResult<()> {
        self.transport
            .execute(AtCommand::PreferredStorage(memory.to_string()).into_command())
            .await?
            .into_result()?;
        Ok(())
    }
}
