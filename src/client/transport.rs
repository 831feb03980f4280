// ABOUTME: Single-owner AT transport: one task holds the byte stream, runs commands and reads idle data
// ABOUTME: Callers are serialized by an exchange lock; connection faults trigger reconnect and retry

//! AT command transport.
//!
//! One tokio task owns the connection exclusively. Callers hand it commands
//! over an mpsc channel and receive the outcome on a oneshot. While no command
//! is in flight the task reads unsolicited data, splits it into complete lines
//! and publishes the chunks on the [`NotificationFeed`]. `+CMT:` notifications
//! that arrive in the middle of a reply are diverted to the same feed.
//!
//! The task loop uses a biased `select!` so that cancellation is checked
//! first, queued commands second and idle reads last.

use crate::client::error::{ModemError, ModemResult};
use crate::client::types::Response;
use crate::command::Command;
use crate::connection::{Connection, Connector};
use crate::frame::{LineBuffer, ResponseBuffer};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Transport tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Pause between closing a faulted connection and reopening it
    pub reconnect_backoff: Duration,
    /// Longest single idle read before the task checks for commands again
    pub idle_poll: Duration,
    /// Unsolicited chunks buffered for the listener before new ones are dropped.
    /// Zero is treated as one.
    pub notification_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(1),
            idle_poll: Duration::from_millis(100),
            notification_capacity: 64,
        }
    }
}

impl TransportConfig {
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }
}

enum Request {
    Execute {
        command: Command,
        reply: oneshot::Sender<ModemResult<Response>>,
    },
}

/// Receiving end of the unsolicited-data channel.
///
/// Each item is a chunk of one or more complete lines. A `+CMT:` header and
/// its PDU line always arrive in the same chunk.
#[derive(Debug)]
pub struct NotificationFeed {
    receiver: mpsc::Receiver<String>,
}

impl NotificationFeed {
    /// Next chunk; `None` once the transport task has stopped
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Handle to the transport task.
///
/// Share it by `Arc`; the task stops when [`Transport::shutdown`] is called
/// or the last handle is dropped.
#[derive(Debug)]
pub struct Transport {
    requests: mpsc::Sender<Request>,
    lock: Mutex<()>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Holds the exchange lock for a multi-step conversation such as AT+CMGS
pub struct Exchange<'a> {
    transport: &'a Transport,
    _guard: MutexGuard<'a, ()>,
}

impl Exchange<'_> {
    pub async fn execute(&self, command: Command) -> ModemResult<Response> {
        self.transport.dispatch(command).await
    }
}

impl Transport {
    /// Open the connection and start the transport task.
    ///
    /// A failed initial open is returned as [`ModemError::Connection`] and no
    /// task is started.
    pub async fn open<C: Connector>(
        connector: C,
        config: TransportConfig,
    ) -> ModemResult<(Transport, NotificationFeed)> {
        let stream = connector.open().await?;
        info!("modem connection opened");

        let (request_tx, request_rx) = mpsc::channel(32);
        let (notification_tx, notification_rx) =
            mpsc::channel(config.notification_capacity.max(1));
        let cancel = CancellationToken::new();

        let io = IoTask {
            connector,
            connection: Some(Connection::new(stream)),
            config,
            lines: LineBuffer::new(),
            notifications: notification_tx,
        };
        let task = tokio::spawn(io.run(request_rx, cancel.clone()));

        let transport = Transport {
            requests: request_tx,
            lock: Mutex::new(()),
            cancel,
            task: Mutex::new(Some(task)),
        };
        let feed = NotificationFeed {
            receiver: notification_rx,
        };
        Ok((transport, feed))
    }

    /// Run one command under the exchange lock
    pub async fn execute(&self, command: Command) -> ModemResult<Response> {
        let _guard = self.lock.lock().await;
        self.dispatch(command).await
    }

    /// Take the exchange lock for several commands in a row
    pub async fn exchange(&self) -> Exchange<'_> {
        Exchange {
            transport: self,
            _guard: self.lock.lock().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    /// Stop the transport task and wait for it to finish.
    ///
    /// A command already in flight runs to completion first.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "transport task failed");
            }
        }
    }

    async fn dispatch(&self, command: Command) -> ModemResult<Response> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Execute { command, reply })
            .await
            .map_err(|_| ModemError::Closed)?;
        response.await.map_err(|_| ModemError::Closed)?
    }
}

struct IoTask<C: Connector> {
    connector: C,
    connection: Option<Connection<C::Stream>>,
    config: TransportConfig,
    lines: LineBuffer,
    notifications: mpsc::Sender<String>,
}

impl<C: Connector> IoTask<C> {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("transport task cancelled");
                    break;
                }

                request = requests.recv() => {
                    match request {
                        Some(Request::Execute { command, reply }) => {
                            let result = self.execute(command).await;
                            let _ = reply.send(result);
                        }
                        None => {
                            debug!("all transport handles dropped, exiting");
                            break;
                        }
                    }
                }

                _ = self.idle() => {}
            }
        }
    }

    /// Execute a command, reconnecting and retrying after connection faults
    async fn execute(&mut self, command: Command) -> ModemResult<Response> {
        let mut attempts = 0;
        loop {
            match self.attempt(&command).await {
                Ok(response) => return Ok(response),
                Err(fault) => {
                    attempts += 1;
                    self.connection = None;
                    if attempts > command.options.max_retries {
                        error!(
                            command = %command.display(),
                            attempts,
                            error = %fault,
                            "giving up after repeated connection faults"
                        );
                        return Err(ModemError::TransportExhausted {
                            attempts,
                            source: fault,
                        });
                    }
                    warn!(
                        command = %command.display(),
                        attempt = attempts,
                        error = %fault,
                        "connection fault, reconnecting"
                    );
                    sleep(self.config.reconnect_backoff).await;
                }
            }
        }
    }

    /// One write-then-poll cycle. `Err` means the connection is unusable.
    async fn attempt(&mut self, command: &Command) -> io::Result<Response> {
        if self.connection.is_none() {
            let stream = self.connector.open().await?;
            info!("modem connection reopened");
            self.connection = Some(Connection::new(stream));
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no connection"));
        };

        // A +CMT: header read while idle must meet its PDU line in the reply
        let mut response = ResponseBuffer::new();
        response.extend(&self.lines.take_remaining());

        debug!(command = %command.display(), "sending command");
        connection.write_command(&command.bytes).await?;

        let keywords = command.options.keywords.as_slice();
        let deadline = Instant::now() + command.options.timeout;

        loop {
            let data = match timeout_at(deadline, connection.read_chunk()).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!(command = %command.display(), "no keyword before timeout");
                    if let Some(held) = response.take_unpaired_notification() {
                        debug!("notification header incomplete, keeping it for the idle reader");
                        self.lines.extend(&held);
                    }
                    return Ok(Response::TimedOut {
                        partial: response.into_partial(),
                    });
                }
            };
            trace!(len = data.len(), "response data");
            if !response.extend(&data) {
                warn!(command = %command.display(), "response overflowed the buffer, discarding");
                continue;
            }

            for notification in response.divert_unsolicited() {
                debug!("notification arrived during command, diverting");
                publish(&self.notifications, notification);
            }

            if let Some(found) = response.find_keyword(keywords) {
                let keyword = keywords[found.index].clone();
                let (text, rest) = response.take_response(found.end);
                debug!(keyword = %keyword, "response matched");
                if !rest.is_empty() {
                    feed_lines(&mut self.lines, &self.notifications, &rest);
                }
                return Ok(Response::Matched { keyword, text });
            }
        }
    }

    /// Read unsolicited data, or try to restore a lost connection
    async fn idle(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            sleep(self.config.reconnect_backoff).await;
            match self.connector.open().await {
                Ok(stream) => {
                    info!("modem connection reopened");
                    self.connection = Some(Connection::new(stream));
                }
                Err(e) => warn!(error = %e, "reconnect failed"),
            }
            return;
        };

        match timeout(self.config.idle_poll, connection.read_chunk()).await {
            Err(_) => {}
            Ok(Ok(data)) => feed_lines(&mut self.lines, &self.notifications, &data),
            Ok(Err(e)) => {
                warn!(error = %e, "connection fault while idle");
                self.connection = None;
            }
        }
    }
}

fn feed_lines(lines: &mut LineBuffer, notifications: &mpsc::Sender<String>, data: &[u8]) {
    if !lines.extend(data) {
        warn!("unsolicited data overflowed the line buffer, discarding");
        return;
    }
    if let Some(chunk) = lines.take_chunk() {
        publish(notifications, chunk);
    }
}

fn publish(notifications: &mpsc::Sender<String>, chunk: String) {
    match notifications.try_send(chunk) {
        Ok(()) => {}
        Err(TrySendError::Full(chunk)) => {
            warn!(len = chunk.len(), "notification queue full, dropping chunk")
        }
        Err(TrySendError::Closed(_)) => trace!("no notification listener"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::AtCommand;
    use crate::mock::{dead_stream, MockConnector, ScriptedModem, Step};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn fast_config() -> TransportConfig {
        TransportConfig::default()
            .with_reconnect_backoff(Duration::from_millis(10))
            .with_idle_poll(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn returns_as_soon_as_ok_arrives() {
        let (stream, modem) = ScriptedModem::spawn(vec![Step::new("AT", "\r\nOK\r\n")]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let (transport, _feed) = Transport::open(connector, fast_config()).await.unwrap();

        let started = std::time::Instant::now();
        let response = transport
            .execute(AtCommand::Attention.into_command().with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(response.is_ok());
        assert_eq!(response.text(), "\r\nOK\r\n");

        transport.shutdown().await;
        drop(transport);
        assert_eq!(modem.await.unwrap(), vec!["AT\r\n".to_string()]);
    }

    #[tokio::test]
    async fn timeout_is_reported_without_retry() {
        let (stream, _modem) = ScriptedModem::spawn(vec![Step::new("AT+CGATT?", "\r\n+CGATT: 0\r\n")]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let opened = connector.opened();
        let (transport, _feed) = Transport::open(connector, fast_config()).await.unwrap();

        let response = transport
            .execute(
                AtCommand::AttachStatus
                    .into_command()
                    .with_keywords("+CGATT: 1")
                    .with_timeout(Duration::from_millis(200)),
            )
            .await
            .unwrap();
        assert_eq!(
            response,
            Response::TimedOut {
                partial: Some("\r\n+CGATT: 0\r\n".to_string())
            }
        );
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn persistent_faults_exhaust_retries() {
        // Initial stream is dead; every reopen fails
        let connector = MockConnector::new(vec![Ok(dead_stream())]);
        let opened = connector.opened();
        let (transport, _feed) = Transport::open(connector, fast_config()).await.unwrap();

        let err = transport
            .execute(AtCommand::Attention.into_command().with_max_retries(2))
            .await
            .unwrap_err();
        match err {
            ModemError::TransportExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(opened.load(Ordering::SeqCst), 3);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let (stream, modem) = ScriptedModem::spawn(vec![Step::new("AT", "\r\nOK\r\n")]);
        let connector = MockConnector::new(vec![Ok(dead_stream()), Ok(stream)]);
        let (transport, _feed) = Transport::open(connector, fast_config()).await.unwrap();

        let response = transport
            .execute(AtCommand::Attention.into_command())
            .await
            .unwrap();
        assert!(response.is_ok());

        transport.shutdown().await;
        drop(transport);
        assert_eq!(modem.await.unwrap(), vec!["AT\r\n".to_string()]);
    }

    #[tokio::test]
    async fn failed_initial_open_produces_no_transport() {
        let connector: Arc<MockConnector> = MockConnector::new(vec![]);
        let result = Transport::open(connector, fast_config()).await;
        assert!(matches!(result, Err(ModemError::Connection(_))));
    }

    #[tokio::test]
    async fn idle_notifications_reach_the_feed() {
        let (stream, _modem) = ScriptedModem::spawn(vec![
            Step::unsolicited("\r\n+CMT: ,24\r\n0891AB\r\n"),
        ]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let (transport, mut feed) = Transport::open(connector, fast_config()).await.unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, "\r\n+CMT: ,24\r\n0891AB\r\n");
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn notification_inside_reply_is_diverted() {
        let (stream, _modem) = ScriptedModem::spawn(vec![Step::new(
            "AT+CSQ",
            "\r\n+CMT: ,24\r\n0891AB\r\n\r\n+CSQ: 20,99\r\n\r\nOK\r\n",
        )]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let (transport, mut feed) = Transport::open(connector, fast_config()).await.unwrap();

        let response = transport
            .execute(AtCommand::raw("AT+CSQ").into_command())
            .await
            .unwrap();
        assert!(response.contains("+CSQ: 20,99"));
        assert!(!response.contains("+CMT"));

        let chunk = tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, "+CMT: ,24\r\n0891AB\r\n");
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn notification_header_read_while_idle_pairs_with_reply() {
        let (stream, _modem) = ScriptedModem::spawn(vec![
            Step::unsolicited("\r\n+CMT: ,24\r\n"),
            Step::new("AT", "0891AB\r\n\r\nOK\r\n"),
        ]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let (transport, mut feed) = Transport::open(connector, fast_config()).await.unwrap();

        // Let the idle reader pick up the header first
        tokio::time::sleep(Duration::from_millis(100)).await;
        let response = transport
            .execute(AtCommand::Attention.into_command())
            .await
            .unwrap();
        assert_eq!(response.text(), "\r\nOK\r\n");

        let chunk = tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, "+CMT: ,24\r\n0891AB\r\n");
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn notification_header_outlives_a_timed_out_command() {
        let (stream, _modem) = ScriptedModem::spawn(vec![
            Step::new("AT", "\r\n+CMT: ,24\r\n"),
            Step::new("AT+CSQ", "0891AB\r\n\r\n+CSQ: 20,99\r\n\r\nOK\r\n"),
        ]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let (transport, mut feed) = Transport::open(connector, fast_config()).await.unwrap();

        let response = transport
            .execute(
                AtCommand::Attention
                    .into_command()
                    .with_timeout(Duration::from_millis(200)),
            )
            .await
            .unwrap();
        match response {
            Response::TimedOut { partial } => {
                assert!(!partial.unwrap_or_default().contains("+CMT"))
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let response = transport
            .execute(AtCommand::raw("AT+CSQ").into_command())
            .await
            .unwrap();
        assert!(response.contains("+CSQ: 20,99"));
        assert!(!response.contains("0891AB"));

        let chunk = tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, "+CMT: ,24\r\n0891AB\r\n");
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn zero_notification_capacity_still_delivers() {
        let (stream, _modem) = ScriptedModem::spawn(vec![
            Step::unsolicited("\r\n+CMT: ,24\r\n0891AB\r\n"),
        ]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let config = fast_config().with_notification_capacity(0);
        let (transport, mut feed) = Transport::open(connector, config).await.unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, "\r\n+CMT: ,24\r\n0891AB\r\n");
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let (stream, _modem) = ScriptedModem::spawn(vec![]);
        let connector = MockConnector::new(vec![Ok(stream)]);
        let (transport, _feed) = Transport::open(connector, fast_config()).await.unwrap();
        transport.shutdown().await;
        assert!(matches!(
            transport.execute(AtCommand::Attention.into_command()).await,
            Err(ModemError::Closed)
        ));
    }
}
