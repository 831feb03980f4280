// ABOUTME: Modem factory and builder for starting a modem over serial or a custom connector
// ABOUTME: Collects transport and bring-up settings, the SMS handler and the stop token

use crate::client::bringup::BringUpConfig;
use crate::client::error::ModemResult;
use crate::client::listener::{LogSmsHandler, SmsHandler};
use crate::client::modem::{Modem, ModemConfig};
use crate::client::transport::TransportConfig;
use crate::command::CnmiSettings;
use crate::connection::{Connector, SerialConnector, SerialSettings};
use tokio_util::sync::CancellationToken;

/// Builder for a started [`Modem`]
///
/// Without a handler, inbound messages are only logged.
#[derive(Debug)]
pub struct ModemBuilder<H = LogSmsHandler> {
    config: ModemConfig,
    handler: H,
    cancel: CancellationToken,
}

impl Default for ModemBuilder<LogSmsHandler> {
    fn default() -> Self {
        Self::new()
    }
}

impl ModemBuilder<LogSmsHandler> {
    pub fn new() -> Self {
        ModemBuilder {
            config: ModemConfig::default(),
            handler: LogSmsHandler,
            cancel: CancellationToken::new(),
        }
    }

    /// Start a modem on a serial port with default settings
    pub async fn quick_serial(port: impl Into<String>) -> ModemResult<Modem> {
        Self::new().open_serial(SerialSettings::new(port)).await
    }
}

impl<H: SmsHandler> ModemBuilder<H> {
    /// Replace the inbound message handler
    pub fn handler<H2: SmsHandler>(self, handler: H2) -> ModemBuilder<H2> {
        ModemBuilder {
            config: self.config,
            handler,
            cancel: self.cancel,
        }
    }

    pub fn with_config(mut self, config: ModemConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn with_bring_up(mut self, bring_up: BringUpConfig) -> Self {
        self.config.bring_up = bring_up;
        self
    }

    /// Cap the number of attach polls
    pub fn with_attach_attempts(mut self, attempts: u32) -> Self {
        self.config.bring_up.attach_attempts = Some(attempts);
        self
    }

    pub fn with_cnmi(mut self, cnmi: CnmiSettings) -> Self {
        self.config.bring_up.cnmi = cnmi;
        self
    }

    /// Start even if the attach wait ends unattached
    pub fn tolerate_unattached(mut self) -> Self {
        self.config.bring_up.tolerate_unattached = true;
        self
    }

    /// Token that aborts the attach wait and stops the listener
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub async fn open_serial(self, settings: SerialSettings) -> ModemResult<Modem> {
        self.open(SerialConnector::new(settings)).await
    }

    pub async fn open<C: Connector>(self, connector: C) -> ModemResult<Modem> {
        Modem::start(connector, self.config, self.handler, self.cancel).await
    }
}
