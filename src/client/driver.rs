//! The client's two-thread I/O model: a blocking stdin/command thread and a
//! non-blocking network pump thread, sharing an outbound write buffer under
//! a mutex. Mirrors the original `Client::run` (I/O thread plus a 200ms
//! poll loop) and `Client::ui_handler` (blocking command thread).

use std::io::{self, BufRead};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::buffer::{ReadBuffer, TransportError, WriteBuffer, WriteBufferFull, HEADER_SIZE};
use crate::client::commands::{parse_line, ChatCommand, CommandError};
use crate::client::responses::print_response;
use crate::wire::codec::{
    encode_credentials_request, encode_empty_request, encode_send_private_request,
    encode_send_public_request,
};
use crate::wire::message::{ClientMessageType, ServerMessageType};

const PUMP_INTERVAL: Duration = Duration::from_millis(200);

pub struct ClientDriver {
    socket: TcpStream,
    outbox: Arc<Mutex<WriteBuffer>>,
    running: Arc<AtomicBool>,
}

impl ClientDriver {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = TcpStream::connect(addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            outbox: Arc::new(Mutex::new(WriteBuffer::new())),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Spawn the command thread and pump the network connection until the
    /// user quits or the connection fails.
    pub fn run(mut self) {
        let outbox = Arc::clone(&self.outbox);
        let running = Arc::clone(&self.running);
        let ui_thread = thread::spawn(move || ui_loop(outbox, running));

        let mut read_buf = ReadBuffer::new();
        let mut pending_type: Option<ServerMessageType> = None;

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.pump(&mut read_buf, &mut pending_type) {
                eprintln!("Closing due to error: {e}");
                self.running.store(false, Ordering::SeqCst);
                break;
            }
            thread::sleep(PUMP_INTERVAL);
        }

        // The UI thread may have enqueued one last request (e.g. `quit`'s
        // Logout) and flipped `running` to false during the sleep above,
        // after the final scheduled pump already ran. Drain once more so
        // that request actually reaches the socket before it's dropped.
        let _ = self.pump(&mut read_buf, &mut pending_type);

        let _ = ui_thread.join();
    }

    fn pump(
        &mut self,
        read_buf: &mut ReadBuffer,
        pending_type: &mut Option<ServerMessageType>,
    ) -> Result<(), TransportError> {
        loop {
            while read_buf.is_ready() {
                match pending_type.take() {
                    None => {
                        let type_byte = read_buf.read_u8().expect("header is ready");
                        let size = read_buf.read_u16().expect("header is ready");
                        match ServerMessageType::try_from(type_byte) {
                            Ok(msg_type) => {
                                *pending_type = Some(msg_type);
                                read_buf.reset(size as usize);
                            }
                            Err(_) => {
                                println!(
                                    "<*CLIENT*>: Received an unknown message type from server (this is a bug)"
                                );
                                read_buf.reset(HEADER_SIZE);
                            }
                        }
                    }
                    Some(msg_type) => {
                        print_response(msg_type, read_buf);
                        read_buf.reset(HEADER_SIZE);
                    }
                }
            }

            match read_buf.pull(&mut self.socket) {
                Ok(()) => continue,
                Err(TransportError::WouldBlock) => break,
                Err(e) => return Err(e),
            }
        }

        self.drain_outbox()
    }

    fn drain_outbox(&mut self) -> Result<(), TransportError> {
        let Ok(mut outbox) = self.outbox.lock() else { return Ok(()) };
        loop {
            if outbox.is_empty() {
                return Ok(());
            }
            match outbox.drain(&mut self.socket) {
                Ok(()) => continue,
                Err(TransportError::WouldBlock) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

fn ui_loop(outbox: Arc<Mutex<WriteBuffer>>, running: Arc<AtomicBool>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match parse_line(&line) {
            Ok(ChatCommand::Quit) => {
                enqueue(&outbox, |buf| encode_empty_request(buf, ClientMessageType::Logout));
                running.store(false, Ordering::SeqCst);
                break;
            }
            Ok(ChatCommand::List) => {
                enqueue(&outbox, |buf| encode_empty_request(buf, ClientMessageType::ListUsers));
            }
            Ok(ChatCommand::Logout) => {
                enqueue(&outbox, |buf| encode_empty_request(buf, ClientMessageType::Logout));
            }
            Ok(ChatCommand::Login { name, password }) => {
                enqueue(&outbox, |buf| {
                    encode_credentials_request(buf, ClientMessageType::Login, &name, &password)
                });
            }
            Ok(ChatCommand::Register { name, password }) => {
                enqueue(&outbox, |buf| {
                    encode_credentials_request(buf, ClientMessageType::Register, &name, &password)
                });
            }
            Ok(ChatCommand::Send { message, anonymous }) => {
                enqueue(&outbox, |buf| encode_send_public_request(buf, anonymous, &message));
            }
            Ok(ChatCommand::SendPrivate { recipient, message, anonymous }) => {
                enqueue(&outbox, |buf| {
                    encode_send_private_request(buf, anonymous, &recipient, &message)
                });
            }
            Err(CommandError::Unknown(cmd)) => {
                eprintln!("<*CLIENT*>: Unknown command \"{cmd}\"");
            }
            Err(e) => {
                eprintln!("<*CLIENT*>: {e}");
            }
        }
    }
}

fn enqueue(outbox: &Arc<Mutex<WriteBuffer>>, encode: impl FnOnce(&mut WriteBuffer) -> Result<(), WriteBufferFull>) {
    let Ok(mut buf) = outbox.lock() else { return };
    if encode(&mut buf).is_err() {
        eprintln!("<*CLIENT*>: Output buffer full, dropping request (this is a bug)");
    }
}
