// ABOUTME: Demo application sending one SMS through a serial-attached cellular modem
// ABOUTME: Runs bring-up with a capped attach wait, sends, then shuts the modem down

use argh::FromArgs;
use airlink::connection::SerialSettings;
use airlink::{ModemBuilder, ModemControl};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Demo application to show the simplest case of sending an SMS message
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the serial device of the modem's AT port (default: /dev/ttyUSB2)
    #[argh(option)]
    port: Option<String>,

    /// the serial line speed (default: 115200)
    #[argh(option, short = 'b')]
    baud_rate: Option<u32>,

    /// number of network attach polls before giving up (default: 12)
    #[argh(option)]
    attach_attempts: Option<u32>,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// the recipient telephone number
    #[argh(option, short = 't')]
    to: String,
}

#[tokio::main]
async fn main() -> airlink::Result<()> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = cli_args.port.unwrap_or_else(|| "/dev/ttyUSB2".to_owned());
    let settings = SerialSettings::new(&port).with_baud_rate(cli_args.baud_rate.unwrap_or(115_200));

    println!("Opening modem on {port}");

    let modem = ModemBuilder::new()
        .with_attach_attempts(cli_args.attach_attempts.unwrap_or(12))
        .open_serial(settings)
        .await
        .map_err(|e| {
            eprintln!("Modem bring-up failed: {e}");
            e
        })?;

    println!("Modem ready");

    let result = modem.send_sms(&cli_args.to, &cli_args.message).await;
    modem.shutdown().await;

    match result {
        Ok(receipt) => {
            match receipt.reference {
                Some(reference) => println!("Message sent successfully! Reference: {reference}"),
                None => println!("Message sent successfully!"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to send message: {e}");
            Err(e.into())
        }
    }
}
