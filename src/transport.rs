//! # Byte Link Abstraction
//!
//! This module defines the `Link` trait, the reconnectable byte stream the
//! MQTT client runs on, and a TCP implementation using `embassy-net`.
//!
//! A link is opened on every connect attempt and closed through
//! [`Link::close`] on disconnect or after a failure, so the same socket can be
//! reused across the whole device lifetime.

use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{ConnectError, Error as TcpError, TcpSocket};
use embassy_time::Duration;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

/// A reliable, ordered byte stream that can be (re)opened towards a broker.
#[allow(async_fn_in_trait)]
pub trait Link: Read + Write {
    /// Opens the stream to `host:port`, dropping any previous connection.
    async fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Closes the stream. Never fails; a dead stream counts as closed.
    async fn close(&mut self);
}

/// Errors raised by [`TcpLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The host name could not be resolved.
    Dns,
    /// The TCP handshake failed.
    Connect(ConnectError),
    /// The established connection failed.
    Tcp(TcpError),
}

impl embedded_io_async::Error for LinkError {
    fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Dns => ErrorKind::NotFound,
            LinkError::Connect(_) => ErrorKind::ConnectionRefused,
            LinkError::Tcp(_) => ErrorKind::ConnectionReset,
        }
    }
}

/// TCP link using `embassy-net`.
pub struct TcpLink<'a> {
    stack: Stack<'a>,
    socket: TcpSocket<'a>,
    timeout: Duration,
}

impl<'a> TcpLink<'a> {
    /// Creates a new `TcpLink` over `stack` with the given socket buffers.
    ///
    /// `timeout` bounds every socket operation, including the handshake.
    pub fn new(
        stack: Stack<'a>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        timeout: Duration,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(timeout));
        Self {
            stack,
            socket,
            timeout,
        }
    }
}

impl ErrorType for TcpLink<'_> {
    type Error = LinkError;
}

impl Read for TcpLink<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(LinkError::Tcp)
    }
}

impl Write for TcpLink<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(LinkError::Tcp)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        // Flush to ensure data is actually sent to the network
        self.socket.flush().await.map_err(LinkError::Tcp)
    }
}

impl Link for TcpLink<'_> {
    async fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.socket.abort();
        let _ = self.socket.flush().await;

        let addrs = self.stack.dns_query(host, DnsQueryType::A).await.map_err(|_| {
            warn!("DNS lookup for {} failed", host);
            LinkError::Dns
        })?;
        let addr = *addrs.first().ok_or(LinkError::Dns)?;

        self.socket.set_timeout(Some(self.timeout));
        self.socket
            .connect((addr, port))
            .await
            .map_err(LinkError::Connect)
    }

    async fn close(&mut self) {
        self.socket.close();
        let _ = self.socket.flush().await;
        self.socket.abort();
    }
}
