//! # MQTT Serialization Utilities
//!
//! Helper functions for reading and writing MQTT-specific data types from and
//! to byte buffers, such as variable-byte integers and length-prefixed strings.

use crate::error::{PacketError, ProtocolError};

/// Reads a variable-byte integer from the buffer, advancing the cursor.
///
/// This is the encoding MQTT uses for the remaining length of a packet.
pub fn read_variable_byte_integer(cursor: &mut usize, buf: &[u8]) -> Result<usize, PacketError> {
    let mut multiplier = 1;
    let mut value = 0;
    let mut i = 0;
    loop {
        let encoded_byte = buf
            .get(*cursor + i)
            .ok_or(ProtocolError::MalformedPacket)?;
        value += (encoded_byte & 127) as usize * multiplier;
        if (encoded_byte & 128) == 0 {
            break;
        }
        multiplier *= 128;
        i += 1;
        if i >= 4 {
            return Err(ProtocolError::MalformedPacket.into());
        }
    }
    *cursor += i + 1;
    Ok(value)
}

/// Writes a variable-byte integer to the start of `buf` and returns the byte count.
pub fn write_variable_byte_integer_len(
    buf: &mut [u8],
    mut val: usize,
) -> Result<usize, PacketError> {
    let mut i = 0;
    loop {
        let mut encoded_byte = (val % 128) as u8;
        val /= 128;
        if val > 0 {
            encoded_byte |= 128;
        }
        *buf.get_mut(i).ok_or(PacketError::BufferTooSmall)? = encoded_byte;
        i += 1;
        if val == 0 {
            break;
        }
    }
    Ok(i)
}

/// Reads a 2-byte big-endian integer, advancing the cursor.
pub fn read_u16(cursor: &mut usize, buf: &[u8]) -> Result<u16, PacketError> {
    let bytes = buf
        .get(*cursor..*cursor + 2)
        .ok_or(ProtocolError::MalformedPacket)?;
    *cursor += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Reads a length-prefixed binary field, advancing the cursor.
pub fn read_binary<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a [u8], PacketError> {
    let len = read_u16(cursor, buf)? as usize;
    let data = buf
        .get(*cursor..*cursor + len)
        .ok_or(ProtocolError::MalformedPacket)?;
    *cursor += len;
    Ok(data)
}

/// Reads a UTF-8 encoded string (prefixed with a 2-byte length) from the buffer.
pub fn read_utf8_string<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a str, PacketError> {
    let bytes = read_binary(cursor, buf)?;
    core::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8String.into())
}

/// Writes a length-prefixed binary field to the start of `buf`.
pub fn write_binary(buf: &mut [u8], data: &[u8]) -> Result<usize, PacketError> {
    let len = data.len();
    if len > u16::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge.into());
    }
    let required_space = 2 + len;
    let slice = buf
        .get_mut(0..required_space)
        .ok_or(PacketError::BufferTooSmall)?;

    slice[0..2].copy_from_slice(&(len as u16).to_be_bytes());
    slice[2..].copy_from_slice(data);
    Ok(required_space)
}

/// Writes a UTF-8 encoded string (prefixed with a 2-byte length) to the start of `buf`.
pub fn write_utf8_string(buf: &mut [u8], s: &str) -> Result<usize, PacketError> {
    write_binary(buf, s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_byte_integer_spans_multiple_bytes() {
        let mut buf = [0u8; 4];
        let len = write_variable_byte_integer_len(&mut buf, 321).unwrap();
        assert_eq!(&buf[..len], &[0xC1, 0x02]);

        let mut cursor = 0;
        assert_eq!(read_variable_byte_integer(&mut cursor, &buf).unwrap(), 321);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn variable_byte_integer_rejects_five_bytes() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut cursor = 0;
        assert_eq!(
            read_variable_byte_integer(&mut cursor, &buf),
            Err(PacketError::Protocol(ProtocolError::MalformedPacket))
        );
    }

    #[test]
    fn truncated_string_is_malformed() {
        let buf = [0x00, 0x05, b'a', b'b'];
        let mut cursor = 0;
        assert_eq!(
            read_utf8_string(&mut cursor, &buf),
            Err(PacketError::Protocol(ProtocolError::MalformedPacket))
        );
    }

    #[test]
    fn write_string_checks_space() {
        let mut buf = [0u8; 3];
        assert_eq!(write_utf8_string(&mut buf, "abc"), Err(PacketError::BufferTooSmall));
    }
}
