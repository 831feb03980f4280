// ABOUTME: Byte-stream connection to the modem and the Connector seam that opens it
// ABOUTME: Serial ports open through tokio-serial; tests plug in in-memory streams

use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// Default serial line speed
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default serial read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens the byte stream to the modem.
///
/// Called once at start and again after every connection fault, so an
/// implementation must be able to open the device repeatedly.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn open(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Serial port parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB2` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>) -> Self {
        SerialSettings {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// Opens a serial device with `tokio-serial`
#[derive(Debug, Clone)]
pub struct SerialConnector {
    settings: SerialSettings,
}

impl SerialConnector {
    pub fn new(settings: SerialSettings) -> Self {
        SerialConnector { settings }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    async fn open(&self) -> io::Result<SerialStream> {
        debug!(
            port = %self.settings.port,
            baud_rate = self.settings.baud_rate,
            "opening serial port"
        );
        tokio_serial::new(&self.settings.port, self.settings.baud_rate)
            .timeout(self.settings.read_timeout)
            .open_native_async()
            .map_err(io::Error::from)
    }
}

/// An open link to the modem.
///
/// Writes go through a `BufWriter` and are flushed per command; reads land in
/// an internal buffer and are handed out as they arrive, since AT replies
/// carry no length prefix.
#[derive(Debug)]
pub struct Connection<S> {
    stream: BufWriter<S>,
    buffer: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Connection<S> {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Write the whole command and flush it to the device
    pub async fn write_command(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Wait for the next bytes from the device.
    ///
    /// End of stream is reported as `UnexpectedEof`: a modem link never closes
    /// cleanly while in use.
    pub async fn read_chunk(&mut self) -> io::Result<BytesMut> {
        if 0 == self.stream.read_buf(&mut self.buffer).await? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "modem closed the connection",
            ));
        }
        Ok(self.buffer.split())
    }
}
