// ABOUTME: Inbound SMS listener: decodes +CMT notifications from the transport feed
// ABOUTME: and hands each message to an SmsHandler until stopped

use crate::client::transport::NotificationFeed;
use crate::client::types::InboundSms;
use crate::pdu::decode_pdu;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives every decoded inbound message.
///
/// Implemented for any `Fn(InboundSms)` closure that is `Send + Sync`.
pub trait SmsHandler: Send + Sync + 'static {
    fn on_sms(&self, sms: InboundSms);
}

impl<F> SmsHandler for F
where
    F: Fn(InboundSms) + Send + Sync + 'static,
{
    fn on_sms(&self, sms: InboundSms) {
        self(sms)
    }
}

/// Handler that only logs what arrives
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsHandler;

impl SmsHandler for LogSmsHandler {
    fn on_sms(&self, sms: InboundSms) {
        info!(sender = %sms.sender, timestamp = %sms.timestamp, text = %sms.text, "SMS received");
    }
}

/// Handle to a running listener task
#[derive(Debug)]
pub struct Listener {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Listener {
    /// Start listening. The task runs until `cancel` fires or
    /// [`Listener::stop`] is called.
    pub fn spawn<H: SmsHandler>(
        feed: NotificationFeed,
        handler: H,
        cancel: CancellationToken,
    ) -> Listener {
        let task = tokio::spawn(run(feed, handler, cancel.clone()));
        Listener { cancel, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait for its current iteration to finish
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "listener task failed");
        }
    }
}

async fn run<H: SmsHandler>(mut feed: NotificationFeed, handler: H, cancel: CancellationToken) {
    debug!("listener started");
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            chunk = feed.recv() => match chunk {
                Some(chunk) => process_chunk(&chunk, &handler),
                None => {
                    warn!("notification feed closed, waiting for stop");
                    cancel.cancelled().await;
                    break;
                }
            },
        }
    }
    debug!("listener stopped");
}

/// Decode the last non-empty line of a chunk and pass the message on
fn process_chunk<H: SmsHandler>(chunk: &str, handler: &H) {
    let Some(line) = chunk.lines().rev().map(str::trim).find(|l| !l.is_empty()) else {
        return;
    };
    match decode_pdu(line) {
        Ok(pdu) => {
            let sms = InboundSms::from(pdu);
            debug!(sender = %sms.sender, "decoded inbound SMS");
            handler.on_sms(sms);
        }
        Err(e) => warn!(line = %line, error = %e, "ignoring undecodable notification"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const NOTIFICATION: &str = "\r\n+CMT: ,32\r\n\
        0891683108200805F0040D91683119325476F8000842017121436523044F60597D\r\n";

    #[test]
    fn last_line_is_decoded() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handler = move |sms: InboundSms| sink.lock().unwrap().push(sms);

        process_chunk(NOTIFICATION, &handler);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].sender, "+8613912345678");
        assert_eq!(received[0].text, "你好");
        assert_eq!(received[0].timestamp.to_string(), "24/10/17,12:34:56+32");
    }

    #[test]
    fn garbage_is_ignored() {
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let handler = move |_sms: InboundSms| *sink.lock().unwrap() += 1;

        process_chunk("\r\nRING\r\n", &handler);
        process_chunk("\r\n\r\n", &handler);
        process_chunk("+CMT: ,5\r\nZZZZ\r\n", &handler);
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
