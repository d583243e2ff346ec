//! # MQTT 3.1.1 Client
//!
//! `MqttClient` speaks MQTT over any [`Link`] and implements
//! [`MqttTransport`], so it can sit directly under an
//! [`MqttSession`](crate::session::MqttSession).
//!
//! The client is deliberately small: it publishes and subscribes at QoS 0,
//! acknowledges QoS 1 deliveries, and keeps the connection alive with
//! PINGREQ. It never reconnects by itself; that is the session's job.
//!
//! ```ignore
//! let link = TcpLink::new(stack, &mut rx, &mut tx, Duration::from_secs(10));
//! let client = MqttClient::<_, 512>::new(link, MqttOptions::default());
//! let mut session = MqttSession::<_>::new(client);
//! ```

use core::future::Future;
use core::pin::pin;

use embassy_time::{Duration, Instant, Timer};
use futures::future::{Either, select};
use heapless::String;

use crate::config::{Credentials, MAX_HOST_LEN, WillConfig, bounded};
use crate::error::{ConnectReasonCode, MqttError, ProtocolError};
use crate::packet::{
    ConnAck, Connect, DecodePacket, Disconnect, EncodePacket, MqttPacket, PingReq, PingResp,
    PubAck, Publish, QoS, Subscribe,
};
use crate::session::MqttTransport;
use crate::transport::Link;

/// Tuning knobs for [`MqttClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MqttOptions {
    /// Keepalive interval sent in CONNECT, in seconds. `0` disables pings.
    pub keep_alive_secs: u16,
    pub clean_session: bool,
    /// Upper bound for opening the link, the handshake, and any single
    /// packet read or write.
    pub socket_timeout: Duration,
    /// How long `poll` waits for the first byte of an inbound packet.
    pub poll_timeout: Duration,
}

impl Default for MqttOptions {
    fn default() -> Self {
        Self {
            keep_alive_secs: 15,
            clean_session: true,
            socket_timeout: Duration::from_secs(15),
            poll_timeout: Duration::from_millis(10),
        }
    }
}

impl MqttOptions {
    pub fn with_keep_alive(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

/// Connection state, with the numeric codes used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientState {
    /// No CONNACK, or no PINGRESP within a keepalive interval.
    ConnectionTimeout,
    /// The link failed while connected.
    ConnectionLost,
    /// The link could not be opened or the handshake broke off.
    ConnectFailed,
    Disconnected,
    Connected,
    /// The broker answered CONNECT with a refusal.
    Refused(ConnectReasonCode),
}

impl ClientState {
    /// `-4` timeout, `-3` lost, `-2` connect failed, `-1` disconnected,
    /// `0` connected, or the CONNACK refusal code.
    pub fn code(self) -> i32 {
        match self {
            ClientState::ConnectionTimeout => -4,
            ClientState::ConnectionLost => -3,
            ClientState::ConnectFailed => -2,
            ClientState::Disconnected => -1,
            ClientState::Connected => 0,
            ClientState::Refused(reason) => i32::from(reason.code()),
        }
    }
}

enum Reply {
    PubAck(u16),
    PingResp,
}

/// Races `fut` against `timeout`.
async fn with_deadline<F, R, E>(timeout: Duration, fut: F) -> Result<R, MqttError<E>>
where
    F: Future<Output = Result<R, MqttError<E>>>,
{
    match select(pin!(fut), pin!(Timer::after(timeout))).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(MqttError::Timeout),
    }
}

/// Fills `buf` completely. A read of zero bytes means the peer closed.
async fn read_exact<L: Link>(link: &mut L, buf: &mut [u8]) -> Result<(), MqttError<L::Error>> {
    let mut filled = 0;
    while filled < buf.len() {
        match link.read(&mut buf[filled..]).await {
            Ok(0) => return Err(MqttError::Protocol(ProtocolError::ConnectionClosed)),
            Ok(n) => filled += n,
            Err(e) => return Err(MqttError::Transport(e)),
        }
    }
    Ok(())
}

/// Packet buffer size that fits a CONNECT with the longest will and
/// credentials `config` accepts (about 420 bytes).
pub const DEFAULT_BUF_SIZE: usize = 512;

/// An MQTT 3.1.1 client over a reconnectable byte link.
///
/// `BUF_SIZE` bounds every packet in either direction. Inbound packets that
/// do not fit are read off the link and dropped. A smaller buffer than
/// [`DEFAULT_BUF_SIZE`] works as long as the CONNECT fits; otherwise every
/// connect attempt fails with [`MqttError::BufferTooSmall`].
pub struct MqttClient<L, const BUF_SIZE: usize = DEFAULT_BUF_SIZE> {
    link: L,
    options: MqttOptions,
    host: String<MAX_HOST_LEN>,
    port: u16,
    will: Option<WillConfig>,
    state: ClientState,
    buf: [u8; BUF_SIZE],
    next_packet_id: u16,
    last_inbound: Instant,
    last_outbound: Instant,
    ping_outstanding: bool,
}

impl<L: Link, const BUF_SIZE: usize> MqttClient<L, BUF_SIZE> {
    pub fn new(link: L, options: MqttOptions) -> Self {
        Self {
            link,
            options,
            host: String::new(),
            port: 1883,
            will: None,
            state: ClientState::Disconnected,
            buf: [0; BUF_SIZE],
            next_packet_id: 0,
            last_inbound: Instant::from_ticks(0),
            last_outbound: Instant::from_ticks(0),
            ping_outstanding: false,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn options(&self) -> &MqttOptions {
        &self.options
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn next_packet_id(&mut self) -> u16 {
        // Packet id 0 is not allowed.
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);
        self.next_packet_id
    }

    async fn write_buf(&mut self, len: usize) -> Result<(), MqttError<L::Error>> {
        let timeout = self.options.socket_timeout;
        with_deadline(timeout, async {
            self.link
                .write_all(&self.buf[..len])
                .await
                .map_err(MqttError::Transport)?;
            self.link.flush().await.map_err(MqttError::Transport)
        })
        .await?;
        self.last_outbound = Instant::now();
        Ok(())
    }

    /// Writes `buf[..len]`, dropping the connection if the link fails.
    async fn send(&mut self, len: usize) -> Result<(), MqttError<L::Error>> {
        let result = self.write_buf(len).await;
        if result.is_err() {
            self.lose(ClientState::ConnectionLost).await;
        }
        result
    }

    async fn lose(&mut self, state: ClientState) {
        warn!("MQTT connection dropped rc={}", state.code());
        self.state = state;
        self.ping_outstanding = false;
        self.link.close().await;
    }

    async fn read_byte(&mut self) -> Result<u8, MqttError<L::Error>> {
        let mut byte = [0u8; 1];
        read_exact(&mut self.link, &mut byte).await?;
        Ok(byte[0])
    }

    /// Reads the remainder of a packet whose first byte is `header`.
    ///
    /// Returns the packet length in `buf`, or `None` if the packet was too
    /// large and has been discarded.
    async fn read_rest(&mut self, header: u8) -> Result<Option<usize>, MqttError<L::Error>> {
        let mut len_bytes = [0u8; 4];
        let mut count = 0;
        let mut remaining = 0usize;
        let mut multiplier = 1;
        loop {
            if count == len_bytes.len() {
                return Err(MqttError::Protocol(ProtocolError::MalformedPacket));
            }
            let byte = self.read_byte().await?;
            len_bytes[count] = byte;
            count += 1;
            remaining += (byte & 127) as usize * multiplier;
            multiplier *= 128;
            if byte & 128 == 0 {
                break;
            }
        }

        let header_len = 1 + count;
        let total = header_len + remaining;
        if total > BUF_SIZE {
            warn!("dropping {} byte packet, buffer holds {}", total, BUF_SIZE);
            while remaining > 0 {
                let chunk = remaining.min(BUF_SIZE);
                read_exact(&mut self.link, &mut self.buf[..chunk]).await?;
                remaining -= chunk;
            }
            return Ok(None);
        }

        self.buf[0] = header;
        self.buf[1..header_len].copy_from_slice(&len_bytes[..count]);
        read_exact(&mut self.link, &mut self.buf[header_len..total]).await?;
        Ok(Some(total))
    }

    async fn read_packet(&mut self) -> Result<Option<usize>, MqttError<L::Error>> {
        let header = self.read_byte().await?;
        self.read_rest(header).await
    }

    async fn handshake(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), MqttError<L::Error>> {
        let timeout = self.options.socket_timeout;
        with_deadline(timeout, async {
            self.link
                .open(&self.host, self.port)
                .await
                .map_err(MqttError::Transport)
        })
        .await?;

        let mut connect = Connect::new(
            client_id,
            self.options.keep_alive_secs,
            self.options.clean_session,
        );
        connect.will = self.will.as_ref().map(WillConfig::as_last_will);
        if let Some(credentials) = credentials {
            connect.username = Some(credentials.username);
            connect.password = Some(credentials.password);
        }
        let len = connect
            .encode(&mut self.buf)
            .inspect_err(|_| warn!("CONNECT does not fit the {} byte buffer", BUF_SIZE))?;
        self.write_buf(len).await?;

        let Some(len) = with_deadline(timeout, self.read_packet()).await? else {
            return Err(MqttError::Protocol(ProtocolError::InvalidResponse));
        };
        if self.buf[0] >> 4 != 2 {
            return Err(MqttError::Protocol(ProtocolError::InvalidResponse));
        }
        let ack = ConnAck::decode(&self.buf[..len])?;
        match ack.reason_code {
            ConnectReasonCode::Success => Ok(()),
            refused => Err(MqttError::ConnectionRefused(refused)),
        }
    }

    /// Sends a PINGREQ when the link has been quiet for a keepalive interval.
    async fn keep_alive(&mut self) -> Result<(), MqttError<L::Error>> {
        if self.options.keep_alive_secs == 0 {
            return Ok(());
        }
        let interval = Duration::from_secs(u64::from(self.options.keep_alive_secs));
        let now = Instant::now();
        let quiet_in = now.checked_duration_since(self.last_inbound).unwrap_or(interval);
        let quiet_out = now.checked_duration_since(self.last_outbound).unwrap_or(interval);
        if quiet_in < interval && quiet_out < interval {
            return Ok(());
        }

        if self.ping_outstanding {
            self.lose(ClientState::ConnectionTimeout).await;
            return Err(MqttError::Timeout);
        }
        let len = PingReq.encode(&mut self.buf)?;
        self.send(len).await?;
        trace!("PINGREQ sent");
        self.last_inbound = now;
        self.ping_outstanding = true;
        Ok(())
    }

    /// Waits up to the poll timeout for a packet to start, then reads it.
    async fn receive(&mut self) -> Result<Option<usize>, MqttError<L::Error>> {
        let mut first = [0u8; 1];
        let outcome = match select(
            pin!(self.link.read(&mut first)),
            pin!(Timer::after(self.options.poll_timeout)),
        )
        .await
        {
            Either::Left((result, _)) => Some(result),
            Either::Right(((), _)) => None,
        };

        let header = match outcome {
            None => return Ok(None),
            Some(Ok(0)) => {
                self.lose(ClientState::ConnectionLost).await;
                return Err(MqttError::Protocol(ProtocolError::ConnectionClosed));
            }
            Some(Ok(_)) => first[0],
            Some(Err(e)) => {
                self.lose(ClientState::ConnectionLost).await;
                return Err(MqttError::Transport(e));
            }
        };

        let timeout = self.options.socket_timeout;
        match with_deadline(timeout, self.read_rest(header)).await {
            Ok(len) => {
                self.last_inbound = Instant::now();
                Ok(len)
            }
            Err(err) => {
                self.lose(ClientState::ConnectionLost).await;
                Err(err)
            }
        }
    }

    async fn handle_packet(
        &mut self,
        len: usize,
        on_publish: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<(), MqttError<L::Error>> {
        let reply = match crate::packet::decode(&self.buf[..len])? {
            Some(MqttPacket::Publish(publish)) => {
                on_publish(publish.topic, publish.payload);
                match (publish.qos, publish.packet_id) {
                    (QoS::AtLeastOnce, Some(id)) => Some(Reply::PubAck(id)),
                    _ => None,
                }
            }
            Some(MqttPacket::PingReq) => Some(Reply::PingResp),
            Some(MqttPacket::PingResp) => {
                self.ping_outstanding = false;
                None
            }
            Some(MqttPacket::SubAck(ack)) => {
                if ack.reason_codes.contains(&0x80) {
                    warn!("broker rejected subscription {}", ack.packet_id);
                }
                None
            }
            _ => None,
        };

        let len = match reply {
            Some(Reply::PubAck(packet_id)) => PubAck { packet_id }.encode(&mut self.buf)?,
            Some(Reply::PingResp) => PingResp.encode(&mut self.buf)?,
            None => return Ok(()),
        };
        self.send(len).await
    }
}

impl<L: Link, const BUF_SIZE: usize> MqttTransport for MqttClient<L, BUF_SIZE> {
    type Error = MqttError<L::Error>;

    fn set_target(&mut self, host: &str, port: u16) {
        self.host = bounded(host).unwrap_or_else(|_| {
            warn!("broker host {} is too long", host);
            String::new()
        });
        self.port = port;
    }

    fn configure_will(&mut self, will: Option<&WillConfig>) {
        self.will = will.cloned();
    }

    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error> {
        if self.state == ClientState::Connected {
            self.link.close().await;
        }
        self.ping_outstanding = false;

        match self.handshake(client_id, credentials).await {
            Ok(()) => {
                let now = Instant::now();
                self.last_inbound = now;
                self.last_outbound = now;
                self.state = ClientState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = match &err {
                    MqttError::ConnectionRefused(reason) => ClientState::Refused(*reason),
                    MqttError::Timeout => ClientState::ConnectionTimeout,
                    _ => ClientState::ConnectFailed,
                };
                self.link.close().await;
                Err(err)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    async fn disconnect(&mut self) {
        if self.state == ClientState::Connected
            && let Ok(len) = Disconnect.encode(&mut self.buf)
        {
            let _ = self.write_buf(len).await;
        }
        self.state = ClientState::Disconnected;
        self.ping_outstanding = false;
        self.link.close().await;
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        let publish = Publish {
            topic,
            qos: QoS::AtMostOnce,
            retain,
            payload,
            packet_id: None,
        };
        let len = publish.encode(&mut self.buf)?;
        self.send(len).await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        let packet_id = self.next_packet_id();
        let len = Subscribe::new(packet_id, topic, QoS::AtMostOnce).encode(&mut self.buf)?;
        self.send(len).await
    }

    async fn poll(&mut self, on_publish: &mut dyn FnMut(&str, &[u8])) -> Result<(), Self::Error> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        self.keep_alive().await?;

        match self.receive().await? {
            Some(len) => self.handle_packet(len, on_publish).await,
            None => Ok(()),
        }
    }

    fn last_error_code(&self) -> i32 {
        self.state.code()
    }
}
