pub mod client;
pub mod codec;
pub mod command;
pub mod connection;
pub mod datatypes;
pub mod frame;
pub mod pdu;

#[cfg(test)]
mod mock;

// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable};
pub use pdu::{decode_pdu, encode_pdu, DeliverPdu, SubmitPdu};

// Re-export the main client API for easy access
pub use client::{
    InboundSms, MessageStore, Modem, ModemBuilder, ModemControl, ModemError, ModemResult,
    SendReceipt, SmsHandler,
};
pub use command::{AtCommand, Command, ExecuteOptions};
pub use connection::{Connector, SerialConnector, SerialSettings};

/// Error returned by the demo programs and other application glue.
///
/// The library itself reports [`ModemError`] and [`CodecError`]; this boxed
/// alias is for callers that mix those with their own errors.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for application code built on this crate.
///
/// # Examples
///
/// ## Sending an SMS
///
/// ```rust,no_run
/// use airlink::{ModemBuilder, ModemControl, SerialSettings};
///
/// #[tokio::main]
/// async fn main() -> airlink::Result<()> {
///     // Probe the module, configure PDU mode and wait for the network
///     let modem = ModemBuilder::new()
///         .with_attach_attempts(12)
///         .open_serial(SerialSettings::new("/dev/ttyUSB2").with_baud_rate(115_200))
///         .await?;
///
///     let receipt = modem.send_sms("+8613800138000", "Hello").await?;
///     println!("Sent, reference {:?}", receipt.reference);
///
///     modem.shutdown().await;
///     Ok(())
/// }
/// ```
///
/// ## Encoding a PDU without a modem
///
/// ```rust
/// use airlink::encode_pdu;
///
/// let (pdu, length) = encode_pdu("+8613800138000", "Hello").unwrap();
/// assert_eq!(pdu, "0001000D91683108108300F000080A00480065006C006C006F");
/// assert_eq!(length, 24);
/// ```
///
/// ## Receiving messages
///
/// ```rust,no_run
/// use airlink::{InboundSms, ModemBuilder, SerialSettings};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> airlink::Result<()> {
///     let stop = CancellationToken::new();
///     let modem = ModemBuilder::new()
///         .handler(|sms: InboundSms| println!("{} at {}: {}", sms.sender, sms.timestamp, sms.text))
///         .with_cancellation(stop.clone())
///         .open_serial(SerialSettings::new("/dev/ttyUSB2"))
///         .await?;
///
///     tokio::signal::ctrl_c().await?;
///     stop.cancel();
///     modem.shutdown().await;
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
