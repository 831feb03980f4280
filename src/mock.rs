//! In-memory modem for driving the transport in tests.
//!
//! [`MockConnector`] hands out pre-built streams in order, one per open, and
//! counts how often it was asked. [`ScriptedModem`] sits on the far end of a
//! `tokio::io::duplex` pipe, reads commands terminated by `\n`, Ctrl-Z or ESC,
//! and answers the ones its script expects. Commands the script does not
//! expect are recorded and left unanswered. A script can also push
//! unsolicited data or hang up.

use crate::connection::Connector;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

const PIPE_CAPACITY: usize = 4096;

/// Hands out queued streams; an empty queue fails the open
#[derive(Debug)]
pub struct MockConnector {
    streams: Mutex<VecDeque<io::Result<DuplexStream>>>,
    opened: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(streams: Vec<io::Result<DuplexStream>>) -> Arc<MockConnector> {
        Arc::new(MockConnector {
            streams: Mutex::new(streams.into()),
            opened: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Counter of open calls, successful or not
    pub fn opened(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opened)
    }
}

impl Connector for Arc<MockConnector> {
    type Stream = DuplexStream;

    async fn open(&self) -> io::Result<DuplexStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::NotFound, "no modem attached")))
    }
}

/// One entry of a modem script
#[derive(Debug, Clone)]
pub struct Step {
    /// Command text without its terminator; `None` sends `reply` unprompted
    expect: Option<String>,
    reply: String,
    hang_up: bool,
}

impl Step {
    pub fn new(expect: &str, reply: &str) -> Step {
        Step {
            expect: Some(expect.to_string()),
            reply: reply.to_string(),
            hang_up: false,
        }
    }

    /// Expect a command and stay silent
    pub fn silent(expect: &str) -> Step {
        Step::new(expect, "")
    }

    /// Emit `data` as soon as the previous step has been played
    pub fn unsolicited(data: &str) -> Step {
        Step {
            expect: None,
            reply: data.to_string(),
            hang_up: false,
        }
    }

    /// Close the modem end of the pipe, as a USB modem does when it resets
    pub fn hang_up() -> Step {
        Step {
            expect: None,
            reply: String::new(),
            hang_up: true,
        }
    }
}

pub struct ScriptedModem;

impl ScriptedModem {
    /// Start a modem task. Returns the host end of the pipe and a handle that
    /// yields every command received once the host end is closed.
    pub fn spawn(steps: Vec<Step>) -> (DuplexStream, JoinHandle<Vec<String>>) {
        let (host, mut modem) = tokio::io::duplex(PIPE_CAPACITY);
        let task = tokio::spawn(async move {
            let mut script = VecDeque::from(steps);
            let mut pending = Vec::new();
            let mut received = Vec::new();
            loop {
                while script.front().is_some_and(|step| step.expect.is_none()) {
                    if let Some(step) = script.pop_front() {
                        if step.hang_up {
                            return received;
                        }
                        let _ = modem.write_all(step.reply.as_bytes()).await;
                    }
                }

                let Some(command) = read_command(&mut modem, &mut pending).await else {
                    break;
                };
                let text = command.trim_end_matches(['\r', '\n', '\x1a']);
                let expected = script
                    .front()
                    .is_some_and(|step| step.expect.as_deref() == Some(text));
                if expected {
                    if let Some(step) = script.pop_front() {
                        if !step.reply.is_empty() {
                            let _ = modem.write_all(step.reply.as_bytes()).await;
                        }
                    }
                }
                received.push(command);
            }
            received
        });
        (host, task)
    }
}

async fn read_command(stream: &mut DuplexStream, pending: &mut Vec<u8>) -> Option<String> {
    loop {
        if let Some(end) = pending
            .iter()
            .position(|&b| b == b'\n' || b == 0x1A || b == 0x1B)
        {
            let command: Vec<u8> = pending.drain(..=end).collect();
            return Some(String::from_utf8_lossy(&command).into_owned());
        }
        let mut buf = [0u8; 512];
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
        }
    }
}

/// A stream whose far end is already gone
pub fn dead_stream() -> DuplexStream {
    let (host, modem) = tokio::io::duplex(64);
    drop(modem);
    host
}
