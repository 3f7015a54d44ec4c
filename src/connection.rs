//! Per-connection protocol state machine: the two-phase frame reader
//! (header, then body) and the request parsers for each client message
//! type. Domain dispatch and cross-connection fan-out live one level up in
//! [`crate::server`], which is the only place that can see every
//! connection at once.

use std::net::SocketAddr;

use mio::net::TcpStream;
use mio::Token;

use crate::buffer::{ReadBuffer, TransportError, WriteBuffer, HEADER_SIZE, MAX_BODY_SIZE};
use crate::wire::codec::{
    encode_code_response, encode_header_error, is_anonymous, read_alnum_field, read_message_field,
    read_options_byte, FieldError,
};
use crate::wire::message::{
    ClientMessageType, HeaderErrorCode, ListUsersResponseCode, LoginResponseCode,
    LogoutResponseCode, RegisterResponseCode, SendPrivateMessageResponseCode,
    SendPublicMessageResponseCode, ServerMessageType,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body,
}

/// A fully parsed, pre-state-validated client request ready for domain
/// dispatch.
pub enum Command {
    ListUsers,
    Login { name: String, password: String },
    Logout,
    Register { name: String, password: String },
    SendPrivateMessage { anonymous: bool, recipient: String, message: String },
    SendPublicMessage { anonymous: bool, message: String },
}

/// Result of pumping the connection's read side once.
pub enum ReadOutcome {
    /// No more bytes currently available; stop reading until next readable.
    NeedMore,
    /// The connection must be torn down (peer closed/reset, transport
    /// error, or a protocol violation this implementation treats as fatal).
    Close,
    /// A request is fully parsed and needs domain dispatch.
    Command(Command),
}

enum BodyOutcome {
    Command(Command),
    /// A response was written directly into this connection's own write
    /// buffer; no domain dispatch needed.
    Responded,
    /// Encoding the direct response overran the write buffer.
    Fatal,
}

pub struct Connection {
    pub socket: TcpStream,
    pub token: Token,
    pub peer_addr: SocketAddr,
    pub session_id: u64,
    read_buf: ReadBuffer,
    write_buf: WriteBuffer,
    phase: Phase,
    pending_type: Option<ClientMessageType>,
}

impl Connection {
    pub fn new(socket: TcpStream, token: Token, peer_addr: SocketAddr) -> Self {
        Self {
            socket,
            token,
            peer_addr,
            session_id: 0,
            read_buf: ReadBuffer::new(),
            write_buf: WriteBuffer::new(),
            phase: Phase::Header,
            pending_type: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_id != 0
    }

    pub fn wants_write(&self) -> bool {
        !self.write_buf.is_empty()
    }

    pub fn write_buf_mut(&mut self) -> &mut WriteBuffer {
        &mut self.write_buf
    }

    /// Drain the write buffer opportunistically; called whenever the
    /// multiplexer reports this connection writable.
    pub fn write_ready(&mut self) -> Result<(), TransportError> {
        loop {
            if self.write_buf.is_empty() {
                return Ok(());
            }
            match self.write_buf.drain(&mut self.socket) {
                Ok(()) => continue,
                Err(TransportError::WouldBlock) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Pull and decode as much as is currently available, returning either
    /// the first fully parsed command, a signal to stop (no more bytes), or
    /// a signal to close the connection.
    pub fn read_ready(&mut self) -> ReadOutcome {
        loop {
            while self.read_buf.is_ready() {
                match self.phase {
                    Phase::Header => match self.advance_header() {
                        Ok(()) => {}
                        Err(()) => return ReadOutcome::Close,
                    },
                    Phase::Body => {
                        let msg_type = self
                            .pending_type
                            .take()
                            .expect("body phase always has a pending message type");
                        let outcome = self.parse_and_handle_body(msg_type);
                        self.phase = Phase::Header;
                        self.read_buf.reset(HEADER_SIZE);
                        match outcome {
                            BodyOutcome::Command(cmd) => return ReadOutcome::Command(cmd),
                            BodyOutcome::Responded => {}
                            BodyOutcome::Fatal => return ReadOutcome::Close,
                        }
                    }
                }
            }

            match self.read_buf.pull(&mut self.socket) {
                Ok(()) => continue,
                Err(TransportError::WouldBlock) => return ReadOutcome::NeedMore,
                Err(TransportError::PeerClosed) | Err(TransportError::PeerReset) => {
                    return ReadOutcome::Close
                }
                Err(TransportError::Io(e)) => {
                    tracing::warn!(token = ?self.token, error = %e, "transport error reading connection");
                    return ReadOutcome::Close;
                }
            }
        }
    }

    /// Decode the 3 byte header. On success the buffer is reset to await
    /// the body; on an unknown type it stays in the header phase after
    /// responding; on an oversize body it signals the caller to close.
    fn advance_header(&mut self) -> Result<(), ()> {
        let type_byte = self.read_buf.read_u8().expect("header is ready");
        let size = self.read_buf.read_u16().expect("header is ready");

        match ClientMessageType::try_from(type_byte) {
            Ok(msg_type) => {
                if size as usize > MAX_BODY_SIZE {
                    self.enqueue_header_error(HeaderErrorCode::MaximumMessageSizeExceeded);
                    return Err(());
                }
                self.pending_type = Some(msg_type);
                self.phase = Phase::Body;
                self.read_buf.reset(size as usize);
                Ok(())
            }
            Err(_) => {
                if self.enqueue_header_error(HeaderErrorCode::UnknownMessageType).is_err() {
                    return Err(());
                }
                self.phase = Phase::Header;
                self.read_buf.reset(HEADER_SIZE);
                Ok(())
            }
        }
    }

    fn enqueue_header_error(&mut self, code: HeaderErrorCode) -> Result<(), ()> {
        encode_header_error(&mut self.write_buf, code).map_err(|_| ())
    }

    fn enqueue_code(&mut self, msg_type: ServerMessageType, code: u8) -> Result<(), ()> {
        encode_code_response(&mut self.write_buf, msg_type, code).map_err(|_| ())
    }

    fn parse_and_handle_body(&mut self, msg_type: ClientMessageType) -> BodyOutcome {
        match msg_type {
            ClientMessageType::ListUsers => {
                if !self.is_authenticated() {
                    return self.respond_code(
                        ServerMessageType::ListUsersResponse,
                        ListUsersResponseCode::Unauthenticated.into(),
                    );
                }
                BodyOutcome::Command(Command::ListUsers)
            }
            ClientMessageType::Logout => {
                if !self.is_authenticated() {
                    return self.respond_code(
                        ServerMessageType::LogoutResponse,
                        LogoutResponseCode::Unauthenticated.into(),
                    );
                }
                BodyOutcome::Command(Command::Logout)
            }
            ClientMessageType::Login => {
                if self.is_authenticated() {
                    return self.respond_code(
                        ServerMessageType::LoginResponse,
                        LoginResponseCode::Unauthorized.into(),
                    );
                }
                match self.parse_login_fields() {
                    Ok((name, password)) => BodyOutcome::Command(Command::Login { name, password }),
                    Err(code) => self.respond_code(ServerMessageType::LoginResponse, code.into()),
                }
            }
            ClientMessageType::Register => {
                if self.is_authenticated() {
                    return self.respond_code(
                        ServerMessageType::RegisterResponse,
                        RegisterResponseCode::Unauthorized.into(),
                    );
                }
                match self.parse_register_fields() {
                    Ok((name, password)) => {
                        BodyOutcome::Command(Command::Register { name, password })
                    }
                    Err(code) => self.respond_code(ServerMessageType::RegisterResponse, code.into()),
                }
            }
            ClientMessageType::SendPublicMessage => {
                if !self.is_authenticated() {
                    return self.respond_code(
                        ServerMessageType::SendPublicMessageResponse,
                        SendPublicMessageResponseCode::Unauthenticated.into(),
                    );
                }
                match self.parse_send_public_fields() {
                    Ok((anonymous, message)) => {
                        BodyOutcome::Command(Command::SendPublicMessage { anonymous, message })
                    }
                    Err(code) => {
                        self.respond_code(ServerMessageType::SendPublicMessageResponse, code.into())
                    }
                }
            }
            ClientMessageType::SendPrivateMessage => {
                if !self.is_authenticated() {
                    return self.respond_code(
                        ServerMessageType::SendPrivateMessageResponse,
                        SendPrivateMessageResponseCode::Unauthenticated.into(),
                    );
                }
                match self.parse_send_private_fields() {
                    Ok((anonymous, recipient, message)) => BodyOutcome::Command(
                        Command::SendPrivateMessage { anonymous, recipient, message },
                    ),
                    Err(code) => {
                        self.respond_code(ServerMessageType::SendPrivateMessageResponse, code.into())
                    }
                }
            }
        }
    }

    fn respond_code(&mut self, msg_type: ServerMessageType, code: u8) -> BodyOutcome {
        match self.enqueue_code(msg_type, code) {
            Ok(()) => BodyOutcome::Responded,
            Err(()) => BodyOutcome::Fatal,
        }
    }

    fn parse_login_fields(&mut self) -> Result<(String, String), LoginResponseCode> {
        let name = read_alnum_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => LoginResponseCode::MissingNameLength,
            FieldError::InvalidLength => LoginResponseCode::InvalidNameLength,
            FieldError::MissingBytes => LoginResponseCode::MissingName,
            FieldError::InvalidByte => LoginResponseCode::InvalidName,
        })?;
        let password = read_alnum_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => LoginResponseCode::MissingPasswordLength,
            FieldError::InvalidLength => LoginResponseCode::InvalidPasswordLength,
            FieldError::MissingBytes => LoginResponseCode::MissingPassword,
            FieldError::InvalidByte => LoginResponseCode::InvalidPassword,
        })?;
        Ok((name, password))
    }

    fn parse_register_fields(&mut self) -> Result<(String, String), RegisterResponseCode> {
        let name = read_alnum_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => RegisterResponseCode::MissingNameLength,
            FieldError::InvalidLength => RegisterResponseCode::InvalidNameLength,
            FieldError::MissingBytes => RegisterResponseCode::MissingName,
            FieldError::InvalidByte => RegisterResponseCode::InvalidName,
        })?;
        let password = read_alnum_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => RegisterResponseCode::MissingPasswordLength,
            FieldError::InvalidLength => RegisterResponseCode::InvalidPasswordLength,
            FieldError::MissingBytes => RegisterResponseCode::MissingPassword,
            FieldError::InvalidByte => RegisterResponseCode::InvalidPassword,
        })?;
        Ok((name, password))
    }

    fn parse_send_public_fields(&mut self) -> Result<(bool, String), SendPublicMessageResponseCode> {
        let opts = read_options_byte(&mut self.read_buf)
            .ok_or(SendPublicMessageResponseCode::MissingOptions)?;
        let message = read_message_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => SendPublicMessageResponseCode::MissingMessageLength,
            FieldError::InvalidLength => SendPublicMessageResponseCode::InvalidMessageLength,
            FieldError::MissingBytes => SendPublicMessageResponseCode::MissingMessage,
            FieldError::InvalidByte => SendPublicMessageResponseCode::InvalidMessage,
        })?;
        Ok((is_anonymous(opts), message))
    }

    fn parse_send_private_fields(
        &mut self,
    ) -> Result<(bool, String, String), SendPrivateMessageResponseCode> {
        let opts = read_options_byte(&mut self.read_buf)
            .ok_or(SendPrivateMessageResponseCode::MissingOptions)?;
        let recipient = read_alnum_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => SendPrivateMessageResponseCode::MissingNameLength,
            FieldError::InvalidLength => SendPrivateMessageResponseCode::InvalidNameLength,
            FieldError::MissingBytes => SendPrivateMessageResponseCode::MissingName,
            FieldError::InvalidByte => SendPrivateMessageResponseCode::InvalidName,
        })?;
        let message = read_message_field(&mut self.read_buf).map_err(|e| match e {
            FieldError::MissingLength => SendPrivateMessageResponseCode::MissingMessageLength,
            FieldError::InvalidLength => SendPrivateMessageResponseCode::InvalidMessageLength,
            FieldError::MissingBytes => SendPrivateMessageResponseCode::MissingMessage,
            FieldError::InvalidByte => SendPrivateMessageResponseCode::InvalidMessage,
        })?;
        Ok((is_anonymous(opts), recipient, message))
    }
}
