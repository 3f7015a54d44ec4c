//! Shared helpers for driving a real `ChatServer` over loopback TCP from
//! plain blocking `std::net::TcpStream`s, in the style of a hand-rolled
//! protocol client rather than the library's own async-ish driver.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use chatnet::ChatServer;

/// Starts a server on an OS-assigned loopback port in a background thread
/// and returns its address. The thread is intentionally leaked for the
/// lifetime of the test process.
pub fn start_server() -> SocketAddr {
    let mut server = ChatServer::bind("127.0.0.1:0".parse().unwrap()).expect("bind");
    let addr = server.local_addr().expect("local_addr");
    thread::spawn(move || {
        let _ = server.run();
    });
    // Give the server's event loop a moment to start polling.
    thread::sleep(Duration::from_millis(20));
    addr
}

pub fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream
}

pub fn send_frame(stream: &mut TcpStream, msg_type: u8, body: &[u8]) {
    let mut frame = Vec::with_capacity(3 + body.len());
    frame.push(msg_type);
    frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
    frame.extend_from_slice(body);
    stream.write_all(&frame).unwrap();
}

/// Blocks until a full frame has arrived and returns its type and body.
pub fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 3];
    stream.read_exact(&mut header).unwrap();
    let msg_type = header[0];
    let body_len = u16::from_le_bytes([header[1], header[2]]) as usize;
    let mut body = vec![0u8; body_len];
    stream.read_exact(&mut body).unwrap();
    (msg_type, body)
}

pub fn login_request(name: &str, password: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(name.len() as u8);
    body.extend_from_slice(name.as_bytes());
    body.push(password.len() as u8);
    body.extend_from_slice(password.as_bytes());
    body
}

pub fn register_request(name: &str, password: &str) -> Vec<u8> {
    login_request(name, password)
}

pub fn send_public_request(anonymous: bool, message: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(if anonymous { 1 } else { 0 });
    body.extend_from_slice(&(message.len() as u16).to_le_bytes());
    body.extend_from_slice(message.as_bytes());
    body
}

pub fn send_private_request(anonymous: bool, recipient: &str, message: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(if anonymous { 1 } else { 0 });
    body.push(recipient.len() as u8);
    body.extend_from_slice(recipient.as_bytes());
    body.extend_from_slice(&(message.len() as u16).to_le_bytes());
    body.extend_from_slice(message.as_bytes());
    body
}

pub fn register_and_login(stream: &mut TcpStream, name: &str, password: &str) {
    send_frame(stream, 3, &register_request(name, password)); // Register = 3
    let (msg_type, body) = read_frame(stream);
    assert_eq!(msg_type, 4); // RegisterResponse
    assert_eq!(body, vec![0]); // Success

    send_frame(stream, 1, &login_request(name, password)); // Login = 1
    let (msg_type, body) = read_frame(stream);
    assert_eq!(msg_type, 2); // LoginResponse
    assert_eq!(body, vec![0]); // Success
}
