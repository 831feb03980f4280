// ABOUTME: Modem client module: transport, bring-up, inbound listener and command facade
// ABOUTME: Exports the traits, builders, configuration and error types callers work with

//! Modem Client Module
//!
//! * **Single-owner transport** - one task owns the serial stream; commands are
//!   queued to it and unsolicited data is published on a feed
//! * **Retry and reconnect** - connection faults reopen the device and retry
//!   the command, up to a per-command bound
//! * **Bring-up** - module, SIM and message-service setup, then a capped and
//!   cancellable network attach wait
//! * **Listener** - decodes `+CMT:` notifications and hands each SMS to an
//!   [`SmsHandler`]
//! * **Native async traits** - [`ModemControl`] and [`MessageStore`] for
//!   collaborators that should not depend on the concrete [`Modem`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use airlink::client::{InboundSms, ModemBuilder, ModemControl};
//! use airlink::connection::SerialSettings;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let modem = ModemBuilder::new()
//!     .handler(|sms: InboundSms| println!("{}: {}", sms.sender, sms.text))
//!     .with_attach_attempts(12)
//!     .open_serial(SerialSettings::new("/dev/ttyUSB2"))
//!     .await?;
//!
//! let receipt = modem.send_sms("+8613800138000", "Hello").await?;
//! println!("accepted with reference {:?}", receipt.reference);
//!
//! modem.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bringup;
pub mod builder;
pub mod error;
pub mod listener;
pub mod modem;
pub mod traits;
pub mod transport;
pub mod types;

pub use bringup::{bring_up, AttachStatus, BringUpConfig};
pub use builder::ModemBuilder;
pub use error::{ModemError, ModemResult};
pub use listener::{Listener, LogSmsHandler, SmsHandler};
pub use modem::{Modem, ModemConfig};
pub use traits::{MessageStore, ModemControl};
pub use transport::{Exchange, NotificationFeed, Transport, TransportConfig};
pub use types::{InboundSms, Response, SendReceipt, StoredMessage};
