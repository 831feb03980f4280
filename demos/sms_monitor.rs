// ABOUTME: Long-running demo that prints every SMS the modem receives
// ABOUTME: Optionally dumps stored messages first; stops cleanly on Ctrl-C or after a run duration

//! # SMS Monitor
//!
//! Brings the modem up, optionally lists what is already in storage, then
//! prints inbound messages as `+CMT:` notifications arrive.
//!
//! ```bash
//! cargo run --example sms_monitor -- --port /dev/ttyUSB2
//!
//! # List and delete stored messages first, stop after ten minutes
//! cargo run --example sms_monitor -- --port /dev/ttyUSB2 \
//!   --list-stored --purge --run-duration 600
//! ```

use argh::FromArgs;
use airlink::client::{InboundSms, MessageStore};
use airlink::command::{DeleteFlag, MessageStatus};
use airlink::connection::SerialSettings;
use airlink::ModemBuilder;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Print inbound SMS messages from a serial-attached modem
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

    /// print messages already held in storage before listening
    #[argh(switch)]
    list_stored: bool,

    /// delete every stored message after listing
    #[argh(switch)]
    purge: bool,

    /// how long to run in seconds (default: until Ctrl-C)
    #[argh(option)]
    run_duration: Option<u64>,
}

fn print_sms(sms: InboundSms) {
    let part = sms
        .concatenation
        .map(|c| format!(" [part {}/{}]", c.sequence, c.total))
        .unwrap_or_default();
    println!("{} at {}{part}: {}", sms.sender, sms.timestamp, sms.text);
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

    let stop = CancellationToken::new();
    let modem = ModemBuilder::new()
        .handler(print_sms)
        .with_cancellation(stop.clone())
        .open_serial(settings)
        .await?;
    info!(port = %port, "modem ready");

    if cli_args.list_stored {
        let stored = modem.list_messages(MessageStatus::All).await?;
        info!(count = stored.len(), "stored messages");
        for entry in stored {
            println!("#{} ({:?})", entry.index, entry.status);
            print_sms(entry.message);
        }
        if cli_args.purge {
            if let Err(e) = modem.delete_message(1, DeleteFlag::All).await {
                warn!(error = %e, "failed to purge storage");
            }
        }
    }

    let run_duration = cli_args
        .run_duration
        .map_or(Duration::MAX, Duration::from_secs);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupted, shutting down");
        }
        _ = sleep(run_duration) => info!("run duration elapsed, shutting down"),
    }

    stop.cancel();
    modem.shutdown().await;
    Ok(())
}
