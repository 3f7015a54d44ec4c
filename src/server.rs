//! The connection multiplexer: a single-threaded, `mio`-driven accept/read/
//! write loop over a fixed-size, index-compacting slot table.
//!
//! Tokens double as slot indices (`Token(0)` is reserved for the listener;
//! a connection in slot `i` is registered under `Token(i + 1)`), mirroring
//! the original implementation's `PollData` design while using `mio`'s
//! modern registry-based API instead of an OS-level raw poll array.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use crate::buffer::WriteBuffer;
use crate::connection::{Command, Connection, ReadOutcome};
use crate::domain::{ChatApp, DomainError};
use crate::wire::codec::{encode_code_response, encode_event, encode_list_users_success};
use crate::wire::message::{
    LoginResponseCode, LogoutResponseCode, RegisterResponseCode, SendPrivateMessageResponseCode,
    SendPublicMessageResponseCode, ServerMessageType,
};

/// Maximum number of simultaneously connected clients.
pub const MAX_CONN: usize = 64;

const SERVER_TOKEN: Token = Token(0);
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

struct ReadyEvent {
    token: Token,
    readable: bool,
    writable: bool,
    error: bool,
}

pub struct ChatServer {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: Vec<Option<Connection>>,
    /// Exclusive upper bound of slots that may be occupied; grows as slots
    /// fill in order and collapses back to `live_count` on compaction.
    compact_index: usize,
    live_count: usize,
    chat_app: ChatApp,
}

impl ChatServer {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, SERVER_TOKEN, Interest::READABLE)?;

        tracing::info!(%addr, "chat server listening");

        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            connections: (0..MAX_CONN).map(|_| None).collect(),
            compact_index: 0,
            live_count: 0,
            chat_app: ChatApp::new(),
        })
    }

    /// The address actually bound, useful when `addr`'s port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Drive the event loop forever.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.tick()?;
        }
    }

    fn tick(&mut self) -> io::Result<()> {
        self.poll.poll(&mut self.events, Some(POLL_TIMEOUT))?;

        let ready: Vec<ReadyEvent> = self
            .events
            .iter()
            .map(|e| ReadyEvent {
                token: e.token(),
                readable: e.is_readable(),
                writable: e.is_writable(),
                error: e.is_error(),
            })
            .collect();

        for ev in ready {
            if ev.token == SERVER_TOKEN {
                self.accept_loop();
            } else {
                self.handle_client_event(ev);
            }
        }

        Ok(())
    }

    fn accept_loop(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    if self.live_count >= MAX_CONN {
                        tracing::warn!(%peer_addr, "connection rejected: server at capacity");
                        break;
                    }
                    self.insert_connection(stream, peer_addr);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn insert_connection(&mut self, stream: TcpStream, peer_addr: SocketAddr) {
        if self.compact_index == MAX_CONN {
            self.compact();
        }

        let idx = self.compact_index;
        let token = Token(idx + 1);
        let mut conn = Connection::new(stream, token, peer_addr);

        if let Err(e) = self.poll.registry().register(&mut conn.socket, token, Interest::READABLE) {
            tracing::warn!(%peer_addr, error = %e, "failed to register new connection");
            return;
        }

        self.connections[idx] = Some(conn);
        self.live_count += 1;
        self.compact_index += 1;
        tracing::info!(%peer_addr, ?token, "client connected");
    }

    /// Slide every live slot left to close gaps left by removed
    /// connections, re-registering each moved connection under its new
    /// token so `mio` keeps delivering events for it.
    fn compact(&mut self) {
        let mut write = 0usize;
        for read in 0..MAX_CONN {
            if self.connections[read].is_none() {
                continue;
            }
            if write != read {
                let mut conn = self.connections[read].take().unwrap();
                let new_token = Token(write + 1);
                let interest = interest_for(conn.wants_write());
                match self.poll.registry().reregister(&mut conn.socket, new_token, interest) {
                    Ok(()) => {
                        conn.token = new_token;
                        if conn.is_authenticated() {
                            self.chat_app.update_session_token(conn.session_id, new_token);
                        }
                        self.connections[write] = Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to reregister connection during compaction");
                        self.chat_app.logout(conn.session_id);
                        self.live_count -= 1;
                    }
                }
            }
            write += 1;
        }
        self.compact_index = write;
    }

    fn remove_connection(&mut self, token: Token) {
        let idx = token.0 - 1;
        if let Some(mut conn) = self.connections[idx].take() {
            let _ = self.poll.registry().deregister(&mut conn.socket);
            if conn.is_authenticated() {
                let name = self.chat_app.display_name(conn.session_id);
                self.chat_app.logout(conn.session_id);
                if let Some(name) = name {
                    tracing::info!(user = %name, ?token, "connection closed, session logged out");
                }
            } else {
                tracing::info!(?token, peer_addr = %conn.peer_addr, "connection closed");
            }
            self.live_count -= 1;
        }
    }

    fn handle_client_event(&mut self, ev: ReadyEvent) {
        let idx = ev.token.0 - 1;
        if idx >= self.connections.len() {
            return;
        }

        if ev.error {
            self.remove_connection(ev.token);
            return;
        }

        if ev.writable {
            let result = match self.connections[idx].as_mut() {
                Some(conn) => conn.write_ready(),
                None => return,
            };
            if result.is_err() {
                self.remove_connection(ev.token);
                return;
            }
        }

        if ev.readable {
            loop {
                let outcome = match self.connections[idx].as_mut() {
                    Some(conn) => conn.read_ready(),
                    None => return,
                };
                match outcome {
                    ReadOutcome::Command(cmd) => self.dispatch(ev.token, cmd),
                    ReadOutcome::NeedMore => break,
                    ReadOutcome::Close => {
                        self.flush_before_close(ev.token);
                        return;
                    }
                }
            }
        }

        self.update_interest(ev.token);
    }

    /// A response (e.g. a `HeaderErrorResponse` for an oversize body) may
    /// have just been queued in the same pass that decided to close this
    /// connection. Give it one best-effort, non-blocking drain so the peer
    /// sees it before the socket goes away.
    fn flush_before_close(&mut self, token: Token) {
        let idx = token.0 - 1;
        if let Some(conn) = self.connections[idx].as_mut() {
            let _ = conn.write_ready();
        }
        self.remove_connection(token);
    }

    fn update_interest(&mut self, token: Token) {
        let idx = token.0 - 1;
        if let Some(conn) = self.connections[idx].as_mut() {
            let interest = interest_for(conn.wants_write());
            let _ = self.poll.registry().reregister(&mut conn.socket, token, interest);
        }
    }

    fn dispatch(&mut self, token: Token, cmd: Command) {
        match cmd {
            Command::ListUsers => {
                let users = self.chat_app.online_users();
                self.send_to(token, |buf| encode_list_users_success(buf, &users).is_ok());
            }
            Command::Register { name, password } => match self.chat_app.register(&name, &password) {
                Ok(()) => {
                    tracing::info!(user = %name, "new user registered");
                    self.respond(token, ServerMessageType::RegisterResponse, RegisterResponseCode::Success);
                }
                Err(DomainError::UserAlreadyRegistered) => {
                    self.respond(
                        token,
                        ServerMessageType::RegisterResponse,
                        RegisterResponseCode::UserAlreadyRegistered,
                    );
                }
                Err(_) => unreachable!("register only fails with UserAlreadyRegistered"),
            },
            Command::Login { name, password } => match self.chat_app.login(&name, &password, token) {
                Ok(session_id) => {
                    if let Some(conn) = self.connections[token.0 - 1].as_mut() {
                        conn.session_id = session_id;
                    }
                    tracing::info!(user = %name, "user logged in");
                    self.respond(token, ServerMessageType::LoginResponse, LoginResponseCode::Success);
                }
                Err(DomainError::UserDoesNotExist) => {
                    self.respond(token, ServerMessageType::LoginResponse, LoginResponseCode::UserDoesNotExist);
                }
                Err(DomainError::IncorrectPassword) => {
                    self.respond(token, ServerMessageType::LoginResponse, LoginResponseCode::IncorrectPassword);
                }
                Err(_) => unreachable!("login cannot fail any other way"),
            },
            Command::Logout => {
                let session_id = self.connections[token.0 - 1]
                    .as_ref()
                    .map(|c| c.session_id)
                    .unwrap_or(0);
                let name = self.chat_app.display_name(session_id);
                self.chat_app.logout(session_id);
                if let Some(conn) = self.connections[token.0 - 1].as_mut() {
                    conn.session_id = 0;
                }
                if let Some(name) = name {
                    tracing::info!(user = %name, "user logged out");
                }
                self.respond(token, ServerMessageType::LogoutResponse, LogoutResponseCode::Success);
            }
            Command::SendPublicMessage { anonymous, message } => {
                let session_id = self.connections[token.0 - 1]
                    .as_ref()
                    .map(|c| c.session_id)
                    .unwrap_or(0);
                let sender_name = self.chat_app.display_name(session_id);
                let targets = self.chat_app.broadcast_targets(session_id);
                for t in targets {
                    let anon = anonymous;
                    let name = sender_name.clone();
                    let msg = message.clone();
                    self.send_to(t, move |buf| {
                        encode_event(buf, ServerMessageType::SendPublicMessageEvent, anon, name.as_deref(), &msg)
                            .is_ok()
                    });
                }
                if let Some(name) = &sender_name {
                    tracing::info!(user = %name, anonymous, "broadcast public message");
                }
                self.respond(
                    token,
                    ServerMessageType::SendPublicMessageResponse,
                    SendPublicMessageResponseCode::Success,
                );
            }
            Command::SendPrivateMessage { anonymous, recipient, message } => {
                let session_id = self.connections[token.0 - 1]
                    .as_ref()
                    .map(|c| c.session_id)
                    .unwrap_or(0);
                let sender_name = self.chat_app.display_name(session_id);
                match self.chat_app.private_targets(session_id, &recipient) {
                    Err(DomainError::CannotMessageSelf) => {
                        self.respond(
                            token,
                            ServerMessageType::SendPrivateMessageResponse,
                            SendPrivateMessageResponseCode::CannotMessageSelf,
                        );
                    }
                    Ok(targets) if targets.is_empty() => {
                        self.respond(
                            token,
                            ServerMessageType::SendPrivateMessageResponse,
                            SendPrivateMessageResponseCode::UserNotOnline,
                        );
                    }
                    Ok(targets) => {
                        for t in targets {
                            let anon = anonymous;
                            let name = sender_name.clone();
                            let msg = message.clone();
                            self.send_to(t, move |buf| {
                                encode_event(
                                    buf,
                                    ServerMessageType::SendPrivateMessageEvent,
                                    anon,
                                    name.as_deref(),
                                    &msg,
                                )
                                .is_ok()
                            });
                        }
                        if let Some(name) = &sender_name {
                            tracing::info!(from = %name, to = %recipient, anonymous, "sent private message");
                        }
                        self.respond(
                            token,
                            ServerMessageType::SendPrivateMessageResponse,
                            SendPrivateMessageResponseCode::Success,
                        );
                    }
                    Err(_) => unreachable!("private_targets only fails with CannotMessageSelf"),
                }
            }
        }
    }

    fn respond(&mut self, token: Token, msg_type: ServerMessageType, code: impl Into<u8>) {
        let code = code.into();
        self.send_to(token, move |buf| encode_code_response(buf, msg_type, code).is_ok());
    }

    /// Write into `token`'s buffer via `encode`, closing the connection if
    /// the encoder overflows the write buffer.
    fn send_to(&mut self, token: Token, encode: impl FnOnce(&mut WriteBuffer) -> bool) {
        let idx = token.0 - 1;
        let ok = match self.connections.get_mut(idx).and_then(|c| c.as_mut()) {
            Some(conn) => encode(conn.write_buf_mut()),
            None => return,
        };
        if !ok {
            tracing::warn!(?token, "write buffer full, closing connection");
            self.remove_connection(token);
        }
    }
}

fn interest_for(wants_write: bool) -> Interest {
    if wants_write {
        Interest::READABLE | Interest::WRITABLE
    } else {
        Interest::READABLE
    }
}
