//! # MQTT Packet Structures and Serialization
//!
//! This module defines the MQTT 3.1.1 control packets used by the client and
//! the traits for encoding and decoding them to and from a byte buffer.
//!
//! Encoders reserve the longest possible fixed header up front, write the
//! body, then compact the body next to the real header once the remaining
//! length is known.

use crate::error::{ConnectReasonCode, PacketError, ProtocolError};
use crate::util::{self, read_binary, read_u16, read_utf8_string, write_binary, write_utf8_string};
use heapless::Vec;

/// Represents the Quality of Service (QoS) levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ProtocolError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(ProtocolError::MalformedPacket),
        }
    }
}

/// A trait for packets that can be encoded into a byte buffer.
pub trait EncodePacket {
    /// Encodes the packet at the start of `buf`, returning its length.
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError>;
}

/// A trait for packets that can be decoded from a byte buffer.
///
/// `buf` holds one complete packet, fixed header included.
pub trait DecodePacket<'a>: Sized {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError>;
}

/// An enumeration of all MQTT control packets this crate understands.
#[derive(Debug)]
pub enum MqttPacket<'a> {
    Connect(Connect<'a>),
    ConnAck(ConnAck),
    Publish(Publish<'a>),
    PubAck(PubAck),
    Subscribe(Subscribe<'a>),
    SubAck(SubAck),
    PingReq,
    PingResp,
    Disconnect,
}

/// Decodes a raw byte buffer into a specific `MqttPacket`.
pub fn decode(buf: &[u8]) -> Result<Option<MqttPacket<'_>>, PacketError> {
    let Some(first) = buf.first() else {
        return Ok(None);
    };

    let packet_type = first >> 4;
    let packet = match packet_type {
        1 => MqttPacket::Connect(Connect::decode(buf)?),
        2 => MqttPacket::ConnAck(ConnAck::decode(buf)?),
        3 => MqttPacket::Publish(Publish::decode(buf)?),
        4 => MqttPacket::PubAck(PubAck::decode(buf)?),
        8 => MqttPacket::Subscribe(Subscribe::decode(buf)?),
        9 => MqttPacket::SubAck(SubAck::decode(buf)?),
        12 => MqttPacket::PingReq,
        13 => MqttPacket::PingResp,
        14 => MqttPacket::Disconnect,
        _ => {
            return Err(ProtocolError::InvalidPacketType(packet_type).into());
        }
    };

    Ok(Some(packet))
}

// Room for the packet type byte plus a 4-byte remaining length.
const BODY_START: usize = 5;

fn begin(buf: &[u8]) -> Result<usize, PacketError> {
    if buf.len() < BODY_START {
        return Err(PacketError::BufferTooSmall);
    }
    Ok(BODY_START)
}

fn put(buf: &mut [u8], cursor: &mut usize, bytes: &[u8]) -> Result<(), PacketError> {
    let end = *cursor + bytes.len();
    buf.get_mut(*cursor..end)
        .ok_or(PacketError::BufferTooSmall)?
        .copy_from_slice(bytes);
    *cursor = end;
    Ok(())
}

fn put_str(buf: &mut [u8], cursor: &mut usize, s: &str) -> Result<(), PacketError> {
    let tail = buf.get_mut(*cursor..).ok_or(PacketError::BufferTooSmall)?;
    *cursor += write_utf8_string(tail, s)?;
    Ok(())
}

fn finish(buf: &mut [u8], header: u8, end: usize) -> Result<usize, PacketError> {
    let remaining_len = end - BODY_START;
    let len_bytes = util::write_variable_byte_integer_len(&mut buf[1..BODY_START], remaining_len)?;
    let header_len = 1 + len_bytes;
    buf[0] = header;
    buf.copy_within(BODY_START..end, header_len);
    Ok(header_len + remaining_len)
}

/// Skips the fixed header and returns the cursor and the end of the packet.
fn body(buf: &[u8]) -> Result<(usize, usize), PacketError> {
    let mut cursor = 1;
    let remaining_len = util::read_variable_byte_integer(&mut cursor, buf)?;
    let end = cursor + remaining_len;
    if end > buf.len() {
        return Err(ProtocolError::MalformedPacket.into());
    }
    Ok((cursor, end))
}

// --- CONNECT Packet ---

/// Will message carried inside CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWill<'a> {
    pub topic: &'a str,
    pub message: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_WILL: u8 = 0x04;
const FLAG_WILL_RETAIN: u8 = 0x20;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect<'a> {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: &'a str,
    pub will: Option<LastWill<'a>>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl<'a> Connect<'a> {
    pub fn new(client_id: &'a str, keep_alive: u16, clean_session: bool) -> Self {
        Self {
            clean_session,
            keep_alive,
            client_id,
            will: None,
            username: None,
            password: None,
        }
    }
}

impl EncodePacket for Connect<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        let mut cursor = begin(buf)?;
        put_str(buf, &mut cursor, "MQTT")?;
        // Protocol level 4 is MQTT 3.1.1
        let mut flags = 0;
        if self.clean_session {
            flags |= FLAG_CLEAN_SESSION;
        }
        if let Some(will) = &self.will {
            flags |= FLAG_WILL | ((will.qos as u8) << 3);
            if will.retain {
                flags |= FLAG_WILL_RETAIN;
            }
        }
        if self.username.is_some() {
            flags |= FLAG_USERNAME;
        }
        if self.password.is_some() {
            flags |= FLAG_PASSWORD;
        }
        put(buf, &mut cursor, &[4, flags])?;
        put(buf, &mut cursor, &self.keep_alive.to_be_bytes())?;

        put_str(buf, &mut cursor, self.client_id)?;
        if let Some(will) = &self.will {
            put_str(buf, &mut cursor, will.topic)?;
            let tail = buf.get_mut(cursor..).ok_or(PacketError::BufferTooSmall)?;
            cursor += write_binary(tail, will.message)?;
        }
        if let Some(username) = self.username {
            put_str(buf, &mut cursor, username)?;
        }
        if let Some(password) = self.password {
            put_str(buf, &mut cursor, password)?;
        }
        finish(buf, 0x10, cursor)
    }
}

impl<'a> DecodePacket<'a> for Connect<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let (mut cursor, _) = body(buf)?;
        if read_utf8_string(&mut cursor, buf)? != "MQTT" {
            return Err(ProtocolError::InvalidResponse.into());
        }
        let header = buf
            .get(cursor..cursor + 2)
            .ok_or(ProtocolError::MalformedPacket)?;
        let connect_flags = header[1];
        cursor += 2;
        let keep_alive = read_u16(&mut cursor, buf)?;
        let client_id = read_utf8_string(&mut cursor, buf)?;

        let will = if connect_flags & FLAG_WILL != 0 {
            let topic = read_utf8_string(&mut cursor, buf)?;
            let message = read_binary(&mut cursor, buf)?;
            Some(LastWill {
                topic,
                message,
                qos: QoS::try_from((connect_flags >> 3) & 0x03)?,
                retain: connect_flags & FLAG_WILL_RETAIN != 0,
            })
        } else {
            None
        };
        let username = if connect_flags & FLAG_USERNAME != 0 {
            Some(read_utf8_string(&mut cursor, buf)?)
        } else {
            None
        };
        let password = if connect_flags & FLAG_PASSWORD != 0 {
            Some(read_utf8_string(&mut cursor, buf)?)
        } else {
            None
        };

        Ok(Self {
            clean_session: connect_flags & FLAG_CLEAN_SESSION != 0,
            keep_alive,
            client_id,
            will,
            username,
            password,
        })
    }
}

// --- CONNACK Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub reason_code: ConnectReasonCode,
}

impl<'a> DecodePacket<'a> for ConnAck {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let (cursor, end) = body(buf)?;
        if end - cursor != 2 {
            return Err(ProtocolError::MalformedPacket.into());
        }
        Ok(Self {
            session_present: (buf[cursor] & 0x01) != 0,
            reason_code: ConnectReasonCode::from(buf[cursor + 1]),
        })
    }
}

// --- PUBLISH Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub qos: QoS,
    pub retain: bool,
    pub payload: &'a [u8],
    pub packet_id: Option<u16>,
}

impl<'a> DecodePacket<'a> for Publish<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let flags = buf.first().ok_or(ProtocolError::MalformedPacket)? & 0x0F;
        let qos = QoS::try_from((flags >> 1) & 0x03)?;
        let (mut cursor, end) = body(buf)?;

        let topic = read_utf8_string(&mut cursor, buf)?;
        let packet_id = if qos != QoS::AtMostOnce {
            Some(read_u16(&mut cursor, buf)?)
        } else {
            None
        };
        let payload = buf.get(cursor..end).ok_or(ProtocolError::MalformedPacket)?;

        Ok(Publish {
            topic,
            qos,
            retain: flags & 0x01 != 0,
            payload,
            packet_id,
        })
    }
}

impl EncodePacket for Publish<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        let mut cursor = begin(buf)?;

        put_str(buf, &mut cursor, self.topic)?;

        // Packet ID (only for QoS > 0)
        if self.qos != QoS::AtMostOnce
            && let Some(id) = self.packet_id
        {
            put(buf, &mut cursor, &id.to_be_bytes())?;
        }

        put(buf, &mut cursor, self.payload)?;

        let mut header = 0x30 | ((self.qos as u8) << 1);
        if self.retain {
            header |= 0x01;
        }
        finish(buf, header, cursor)
    }
}

// --- PUBACK Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAck {
    pub packet_id: u16,
}

impl<'a> DecodePacket<'a> for PubAck {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let (mut cursor, _) = body(buf)?;
        Ok(PubAck {
            packet_id: read_u16(&mut cursor, buf)?,
        })
    }
}

impl EncodePacket for PubAck {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        let id = self.packet_id.to_be_bytes();
        let out = buf.get_mut(0..4).ok_or(PacketError::BufferTooSmall)?;
        out.copy_from_slice(&[0x40, 0x02, id[0], id[1]]);
        Ok(4)
    }
}

// --- SUBSCRIBE Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe<'a> {
    pub packet_id: u16,
    pub topics: Vec<(&'a str, QoS), 8>,
}

impl<'a> Subscribe<'a> {
    /// Creates a new Subscribe packet with a single topic.
    pub fn new(packet_id: u16, topic: &'a str, qos: QoS) -> Self {
        let mut topics = Vec::new();
        let _ = topics.push((topic, qos));
        Self { packet_id, topics }
    }
}

impl<'a> DecodePacket<'a> for Subscribe<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let (mut cursor, end) = body(buf)?;
        let packet_id = read_u16(&mut cursor, buf)?;

        let mut topics = Vec::new();
        while cursor < end {
            let topic = read_utf8_string(&mut cursor, buf)?;
            let qos = buf.get(cursor).ok_or(ProtocolError::MalformedPacket)?;
            cursor += 1;
            topics
                .push((topic, QoS::try_from(*qos)?))
                .map_err(|_| ProtocolError::PayloadTooLarge)?;
        }
        Ok(Subscribe { packet_id, topics })
    }
}

impl EncodePacket for Subscribe<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        let mut cursor = begin(buf)?;

        put(buf, &mut cursor, &self.packet_id.to_be_bytes())?;

        // Topic filters with QoS
        for (topic, qos) in &self.topics {
            put_str(buf, &mut cursor, topic)?;
            put(buf, &mut cursor, &[*qos as u8])?;
        }

        // SUBSCRIBE packet type (8) with reserved bits (0x02)
        finish(buf, 0x82, cursor)
    }
}

// --- SUBACK Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    pub reason_codes: Vec<u8, 8>,
}

impl<'a> DecodePacket<'a> for SubAck {
    fn decode(buf: &'a [u8]) -> Result<Self, PacketError> {
        let (mut cursor, end) = body(buf)?;
        let packet_id = read_u16(&mut cursor, buf)?;

        let mut reason_codes = Vec::new();
        while cursor < end {
            let _ = reason_codes.push(buf[cursor]);
            cursor += 1;
        }

        Ok(SubAck {
            packet_id,
            reason_codes,
        })
    }
}

fn encode_empty(buf: &mut [u8], header: u8) -> Result<usize, PacketError> {
    let out = buf.get_mut(0..2).ok_or(PacketError::BufferTooSmall)?;
    out.copy_from_slice(&[header, 0x00]);
    Ok(2)
}

// --- PINGREQ Packet ---
#[derive(Debug)]
pub struct PingReq;

impl EncodePacket for PingReq {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        encode_empty(buf, 0xC0)
    }
}

// --- PINGRESP Packet ---
#[derive(Debug)]
pub struct PingResp;

impl EncodePacket for PingResp {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        encode_empty(buf, 0xD0)
    }
}

// --- DISCONNECT Packet ---
#[derive(Debug)]
pub struct Disconnect;

impl EncodePacket for Disconnect {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        encode_empty(buf, 0xE0)
    }
}
