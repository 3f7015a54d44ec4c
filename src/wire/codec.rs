//! Field-level decoders and frame encoders shared by the connection state
//! machine (server side) and the client driver (response side).

use crate::buffer::{ReadBuffer, WriteBuffer, WriteBufferFull, HEADER_SIZE};
use crate::wire::message::{
    ClientMessageType, HeaderErrorCode, ListUsersResponseCode, ServerMessageType, ANONYMOUS_BIT,
    MESSAGE_LEN_RANGE, NAME_LEN_RANGE,
};

/// Outcome of decoding a single length-prefixed field out of a frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    MissingLength,
    InvalidLength,
    MissingBytes,
    InvalidByte,
}

/// Read a `u8`-length-prefixed field whose bytes must be ASCII
/// alphanumeric, used for both user names and passwords.
pub fn read_alnum_field(buf: &mut ReadBuffer) -> Result<String, FieldError> {
    let len = buf.read_u8().ok_or(FieldError::MissingLength)?;
    if !NAME_LEN_RANGE.contains(&len) {
        return Err(FieldError::InvalidLength);
    }

    let mut out = String::with_capacity(len as usize);
    for _ in 0..len {
        let byte = buf.read_u8().ok_or(FieldError::MissingBytes)?;
        if !byte.is_ascii_alphanumeric() {
            return Err(FieldError::InvalidByte);
        }
        out.push(byte as char);
    }
    Ok(out)
}

/// Read a `u16`-length-prefixed field whose bytes must be printable ASCII
/// (0x20..=0x7E), used for chat message bodies.
pub fn read_message_field(buf: &mut ReadBuffer) -> Result<String, FieldError> {
    let len = buf.read_u16().ok_or(FieldError::MissingLength)?;
    if !MESSAGE_LEN_RANGE.contains(&len) {
        return Err(FieldError::InvalidLength);
    }

    let mut out = String::with_capacity(len as usize);
    for _ in 0..len {
        let byte = buf.read_u8().ok_or(FieldError::MissingBytes)?;
        if !(0x20..=0x7E).contains(&byte) {
            return Err(FieldError::InvalidByte);
        }
        out.push(byte as char);
    }
    Ok(out)
}

/// Read the options byte carried by both send-message frames.
pub fn read_options_byte(buf: &mut ReadBuffer) -> Option<u8> {
    buf.read_u8()
}

pub fn is_anonymous(opts: u8) -> bool {
    opts & ANONYMOUS_BIT != 0
}

/// Read a `u8`-length-prefixed string without validating its bytes. Used on
/// the client side to decode names and messages the server has already
/// validated.
pub fn read_raw_str_u8len(buf: &mut ReadBuffer) -> Option<String> {
    let len = buf.read_u8()?;
    let mut out = String::with_capacity(len as usize);
    for _ in 0..len {
        out.push(buf.read_u8()? as char);
    }
    Some(out)
}

/// As [`read_raw_str_u8len`] but with a `u16` length prefix.
pub fn read_raw_str_u16len(buf: &mut ReadBuffer) -> Option<String> {
    let len = buf.read_u16()?;
    let mut out = String::with_capacity(len as usize);
    for _ in 0..len {
        out.push(buf.read_u8()? as char);
    }
    Some(out)
}

pub fn encode_header_error(buf: &mut WriteBuffer, code: HeaderErrorCode) -> Result<(), WriteBufferFull> {
    buf.reserve(HEADER_SIZE + 1)?;
    buf.push_u8(ServerMessageType::HeaderErrorResponse.into());
    buf.push_u16(1);
    buf.push_u8(code.into());
    Ok(())
}

/// Encode a frame whose body is a single response-code byte. Covers the
/// common case shared by every `*Response` message besides `ListUsers`.
pub fn encode_code_response(
    buf: &mut WriteBuffer,
    msg_type: ServerMessageType,
    code: u8,
) -> Result<(), WriteBufferFull> {
    buf.reserve(HEADER_SIZE + 1)?;
    buf.push_u8(msg_type.into());
    buf.push_u16(1);
    buf.push_u8(code);
    Ok(())
}

pub fn encode_list_users_success(buf: &mut WriteBuffer, names: &[String]) -> Result<(), WriteBufferFull> {
    let mut body_size = 1usize + 1; // response code + user count
    for name in names {
        body_size += 1 + name.len();
    }

    buf.reserve(HEADER_SIZE + body_size)?;
    buf.push_u8(ServerMessageType::ListUsersResponse.into());
    buf.push_u16(body_size as u16);
    buf.push_u8(ListUsersResponseCode::Success.into());
    buf.push_u8(names.len() as u8);
    for name in names {
        buf.push_u8(name.len() as u8);
        buf.push_bytes(name.as_bytes());
    }
    Ok(())
}

/// Encode a public or private message event: `opts:u8` followed by either
/// `msg_len:u16, msg[m]` (anonymous) or `name_len:u8, name, msg_len:u16,
/// msg[m]` (attributed).
pub fn encode_event(
    buf: &mut WriteBuffer,
    msg_type: ServerMessageType,
    anonymous: bool,
    sender_name: Option<&str>,
    message: &str,
) -> Result<(), WriteBufferFull> {
    let body_size = if anonymous {
        1 + 2 + message.len()
    } else {
        let name = sender_name.expect("attributed event requires a sender name");
        1 + 1 + name.len() + 2 + message.len()
    };

    buf.reserve(HEADER_SIZE + body_size)?;
    buf.push_u8(msg_type.into());
    buf.push_u16(body_size as u16);
    buf.push_u8(if anonymous { ANONYMOUS_BIT } else { 0 });
    if !anonymous {
        let name = sender_name.unwrap();
        buf.push_u8(name.len() as u8);
        buf.push_bytes(name.as_bytes());
    }
    buf.push_u16(message.len() as u16);
    buf.push_bytes(message.as_bytes());
    Ok(())
}

/// Encode a request frame with an empty body, used for `ListUsers` and
/// `Logout`.
pub fn encode_empty_request(buf: &mut WriteBuffer, msg_type: ClientMessageType) -> Result<(), WriteBufferFull> {
    buf.reserve(HEADER_SIZE)?;
    buf.push_u8(msg_type.into());
    buf.push_u16(0);
    Ok(())
}

/// Encode a `Login` or `Register` request: `name_len:u8, name, password_len:u8, password`.
pub fn encode_credentials_request(
    buf: &mut WriteBuffer,
    msg_type: ClientMessageType,
    name: &str,
    password: &str,
) -> Result<(), WriteBufferFull> {
    let body_size = 1 + name.len() + 1 + password.len();
    buf.reserve(HEADER_SIZE + body_size)?;
    buf.push_u8(msg_type.into());
    buf.push_u16(body_size as u16);
    buf.push_u8(name.len() as u8);
    buf.push_bytes(name.as_bytes());
    buf.push_u8(password.len() as u8);
    buf.push_bytes(password.as_bytes());
    Ok(())
}

/// Encode a `SendPublicMessage` request: `opts:u8, msg_len:u16, msg`.
pub fn encode_send_public_request(
    buf: &mut WriteBuffer,
    anonymous: bool,
    message: &str,
) -> Result<(), WriteBufferFull> {
    let body_size = 1 + 2 + message.len();
    buf.reserve(HEADER_SIZE + body_size)?;
    buf.push_u8(ClientMessageType::SendPublicMessage.into());
    buf.push_u16(body_size as u16);
    buf.push_u8(if anonymous { ANONYMOUS_BIT } else { 0 });
    buf.push_u16(message.len() as u16);
    buf.push_bytes(message.as_bytes());
    Ok(())
}

/// Encode a `SendPrivateMessage` request: `opts:u8, name_len:u8, name, msg_len:u16, msg`.
pub fn encode_send_private_request(
    buf: &mut WriteBuffer,
    anonymous: bool,
    recipient: &str,
    message: &str,
) -> Result<(), WriteBufferFull> {
    let body_size = 1 + 1 + recipient.len() + 2 + message.len();
    buf.reserve(HEADER_SIZE + body_size)?;
    buf.push_u8(ClientMessageType::SendPrivateMessage.into());
    buf.push_u16(body_size as u16);
    buf.push_u8(if anonymous { ANONYMOUS_BIT } else { 0 });
    buf.push_u8(recipient.len() as u8);
    buf.push_bytes(recipient.as_bytes());
    buf.push_u16(message.len() as u16);
    buf.push_bytes(message.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ReadBuffer;

    fn filled(bytes: &[u8]) -> ReadBuffer {
        let mut buf = ReadBuffer::new();
        buf.reset(bytes.len());
        // Feed the bytes through a mock reader so `filled`/`processed`
        // bookkeeping stays internally consistent.
        struct Once<'a>(&'a [u8], bool);
        impl<'a> std::io::Read for Once<'a> {
            fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
                if self.1 {
                    return Err(std::io::Error::from(std::io::ErrorKind::WouldBlock));
                }
                out[..self.0.len()].copy_from_slice(self.0);
                self.1 = true;
                Ok(self.0.len())
            }
        }
        let mut src = Once(bytes, false);
        buf.pull(&mut src).unwrap();
        buf
    }

    #[test]
    fn alnum_field_accepts_valid_name() {
        let mut buf = filled(b"\x04user");
        assert_eq!(read_alnum_field(&mut buf).unwrap(), "user");
    }

    #[test]
    fn alnum_field_rejects_out_of_range_length() {
        let mut buf = filled(b"\x02ab");
        assert_eq!(read_alnum_field(&mut buf), Err(FieldError::InvalidLength));
    }

    #[test]
    fn alnum_field_rejects_non_alphanumeric_byte() {
        let mut buf = filled(b"\x04us-r");
        assert_eq!(read_alnum_field(&mut buf), Err(FieldError::InvalidByte));
    }

    #[test]
    fn message_field_rejects_non_printable_byte() {
        let mut bytes = vec![1, 0]; // len = 1 (LE u16)
        bytes.push(0x01);
        let mut buf = filled(&bytes);
        assert_eq!(read_message_field(&mut buf), Err(FieldError::InvalidByte));
    }

    #[test]
    fn anonymous_bit_is_bitwise_not_logical() {
        assert!(is_anonymous(0b0000_0011));
        assert!(!is_anonymous(0b0000_0010));
    }

    #[test]
    fn encode_list_users_success_matches_expected_layout() {
        let mut buf = WriteBuffer::new();
        encode_list_users_success(&mut buf, &["ann".to_string(), "bob".to_string()]).unwrap();
        let mut socket = Vec::new();
        buf.drain(&mut socket).unwrap();
        assert_eq!(
            socket,
            vec![
                ServerMessageType::ListUsersResponse.into(),
                10, 0, // body size
                ListUsersResponseCode::Success.into(),
                2, // user count
                3, b'a', b'n', b'n',
                3, b'b', b'o', b'b',
            ]
        );
    }
}
