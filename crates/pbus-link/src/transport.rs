//! Transport connectors for serial and TCP bus interfaces
//!
//! The supervisor owns a [`Connector`] and asks it for a fresh duplex
//! stream on every (re)connect. Tests substitute scripted connectors
//! over `tokio::io::duplex`, so nothing above this module knows whether
//! bytes travel over a UART, a socket or an in-memory pipe.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::config::BusConfig;
use crate::error::LinkError;

/// Something that can (re)open the byte stream to the bus interface
pub trait Connector: Send + 'static {
    /// The duplex stream a successful connect yields
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a fresh stream to the bus
    fn connect(&mut self) -> impl Future<Output = Result<Self::Stream, LinkError>> + Send;
}

/// Connects to the bus over a local serial port
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baudrate: u32,
}

impl SerialConnector {
    /// Create a connector for the given port and baud rate
    pub fn new(port: impl Into<String>, baudrate: u32) -> Self {
        Self {
            port: port.into(),
            baudrate,
        }
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    async fn connect(&mut self) -> Result<SerialStream, LinkError> {
        debug!("opening serial port {} at {} baud", self.port, self.baudrate);

        match tokio_serial::new(&self.port, self.baudrate)
            .timeout(Duration::from_millis(100))
            .open_native_async()
        {
            Ok(stream) => Ok(stream),
            // An unknown port is a configuration problem; retrying the
            // same name cannot succeed
            Err(e) if e.kind() == tokio_serial::ErrorKind::NoDevice => Err(LinkError::Config(
                format!("serial port {} is not known", self.port),
            )),
            Err(e) => Err(LinkError::Serial(e)),
        }
    }
}

/// Connects to the bus through a TCP gateway
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    port: u16,
}

impl TcpConnector {
    /// Create a connector for the given host and port
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self) -> Result<TcpStream, LinkError> {
        debug!("connecting to bus gateway {}:{}", self.address, self.port);

        let stream = TcpStream::connect((self.address.as_str(), self.port)).await?;
        Ok(stream)
    }
}

/// Config-driven connector covering both transport kinds
#[derive(Debug, Clone)]
pub enum BusConnector {
    /// Serial port transport
    Serial(SerialConnector),
    /// TCP gateway transport
    Tcp(TcpConnector),
}

impl From<&BusConfig> for BusConnector {
    fn from(config: &BusConfig) -> Self {
        match config {
            BusConfig::Serial(c) => {
                BusConnector::Serial(SerialConnector::new(c.port.clone(), c.baudrate))
            }
            BusConfig::Network(c) => {
                BusConnector::Tcp(TcpConnector::new(c.address.clone(), c.port))
            }
        }
    }
}

impl Connector for BusConnector {
    type Stream = BusStream;

    async fn connect(&mut self) -> Result<BusStream, LinkError> {
        match self {
            BusConnector::Serial(c) => c.connect().await.map(BusStream::Serial),
            BusConnector::Tcp(c) => c.connect().await.map(BusStream::Tcp),
        }
    }
}

/// Duplex stream over either transport kind
pub enum BusStream {
    /// An open serial port
    Serial(SerialStream),
    /// An open TCP connection
    Tcp(TcpStream),
}

impl AsyncRead for BusStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_read(cx, buf),
            BusStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BusStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_write(cx, buf),
            BusStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_flush(cx),
            BusStream::Tcp(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BusStream::Serial(s) => Pin::new(s).poll_shutdown(cx),
            BusStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
