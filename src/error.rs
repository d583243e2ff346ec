//! # Error Types
//!
//! Error types for every layer of the crate: the packet codec, the concrete
//! MQTT client and the session facade sitting on top of any transport.

/// Errors produced while encoding or decoding a control packet.
///
/// The codec never touches the network, so it has no transport variant.
/// It converts into [`MqttError`] so `?` works inside the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// The packet violates the MQTT 3.1.1 format.
    Protocol(ProtocolError),
    /// The buffer provided for encoding was too small.
    BufferTooSmall,
}

impl From<ProtocolError> for PacketError {
    fn from(err: ProtocolError) -> Self {
        PacketError::Protocol(err)
    }
}

/// The primary error enum for the MQTT client.
///
/// It is generic over the link error type `T`, allowing it to wrap
/// specific errors from the underlying byte stream (e.g., TCP, UART).
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError<T> {
    /// An error occurred in the underlying link.
    Transport(T),
    /// A protocol-level error occurred, indicating a violation of the MQTT specification.
    Protocol(ProtocolError),
    /// The connection was refused by the broker. The enclosed code provides the reason.
    ConnectionRefused(ConnectReasonCode),
    /// The client is not currently connected to the broker.
    NotConnected,
    /// The buffer provided for an operation was too small.
    BufferTooSmall,
    /// An operation timed out.
    Timeout,
}

impl<T> From<PacketError> for MqttError<T> {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::Protocol(p) => MqttError::Protocol(p),
            PacketError::BufferTooSmall => MqttError::BufferTooSmall,
        }
    }
}

/// Represents the reason codes for a connection refusal (`CONNACK`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReasonCode {
    /// The connection was accepted.
    Success,
    /// The broker does not support the requested MQTT protocol version.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is not valid.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// An unknown or unspecified error occurred.
    Other(u8),
}

impl ConnectReasonCode {
    /// The raw code as carried in the CONNACK packet.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::UnacceptableProtocolVersion => 1,
            Self::IdentifierRejected => 2,
            Self::ServerUnavailable => 3,
            Self::BadUserNameOrPassword => 4,
            Self::NotAuthorized => 5,
            Self::Other(val) => val,
        }
    }
}

impl From<u8> for ConnectReasonCode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Success,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}

/// Enumerates specific MQTT protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// An invalid packet type was received.
    InvalidPacketType(u8),
    /// The server sent an invalid or unexpected response.
    InvalidResponse,
    /// The connection was closed by the broker.
    ConnectionClosed,
    /// A packet was received that was not correctly formed.
    MalformedPacket,
    /// The payload of a message exceeds the maximum allowable size.
    PayloadTooLarge,
    /// A string was not valid UTF-8.
    InvalidUtf8String,
}

/// Errors reported by [`MqttSession`](crate::session::MqttSession).
///
/// `E` is the error type of the transport the session runs on. Every
/// session operation either succeeds or hands one of these back to the
/// caller; nothing is retried behind its back.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<E> {
    /// `connect` has never been called, so there is no broker to reconnect to.
    NotConfigured,
    /// The connection attempt failed. The transport's
    /// `last_error_code` carries the diagnostic code.
    Connect(E),
    /// The topic cache is full. No subscription was sent.
    CacheFull,
    /// The topic is empty or longer than [`MAX_TOPIC_LEN`](crate::config::MAX_TOPIC_LEN).
    InvalidTopic,
    /// A configuration value does not fit its fixed-size storage.
    ValueTooLong,
    /// A publish or subscribe was rejected by the transport.
    Transport(E),
}

/// A configuration value did not fit its fixed-size buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValueTooLong;

impl<E> From<ValueTooLong> for SessionError<E> {
    fn from(_: ValueTooLong) -> Self {
        SessionError::ValueTooLong
    }
}
