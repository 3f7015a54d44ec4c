//! Drives a real `ChatServer` over loopback TCP and exercises the protocol
//! end to end: registration, auth gating, broadcast and private delivery,
//! and the header-level error paths.

mod common;

use std::io::{Read, Write};
use std::time::Duration;

use common::*;

#[test]
fn register_then_login_then_list_users() {
    let addr = start_server();
    let mut alice = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");

    send_frame(&mut alice, 0, &[]); // ListUsers
    let (msg_type, body) = read_frame(&mut alice);
    assert_eq!(msg_type, 1); // ListUsersResponse
    assert_eq!(body[0], 0); // Success
    assert_eq!(body[1], 1); // one user online
    let name_len = body[2] as usize;
    assert_eq!(&body[3..3 + name_len], b"alice");
}

#[test]
fn login_without_registration_is_rejected() {
    let addr = start_server();
    let mut stream = connect(addr);
    send_frame(&mut stream, 1, &login_request("ghost123", "pass1234"));
    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 2);
    assert_eq!(body, vec![1]); // UserDoesNotExist
}

#[test]
fn listusers_before_login_is_unauthenticated() {
    let addr = start_server();
    let mut stream = connect(addr);
    send_frame(&mut stream, 0, &[]);
    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 1);
    assert_eq!(body, vec![1]); // Unauthenticated
}

#[test]
fn duplicate_registration_is_rejected() {
    let addr = start_server();
    let mut stream = connect(addr);
    send_frame(&mut stream, 3, &register_request("alice", "pass1234"));
    let (_, body) = read_frame(&mut stream);
    assert_eq!(body, vec![0]);

    send_frame(&mut stream, 3, &register_request("ALICE", "otherpwd"));
    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 4);
    assert_eq!(body, vec![1]); // UserAlreadyRegistered, case-insensitive key
}

#[test]
fn login_twice_is_unauthorized() {
    let addr = start_server();
    let mut stream = connect(addr);
    register_and_login(&mut stream, "alice", "pass1234");

    send_frame(&mut stream, 1, &login_request("alice", "pass1234"));
    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 2);
    assert_eq!(body, vec![3]); // Unauthorized
}

#[test]
fn public_message_broadcasts_to_other_clients_but_not_sender() {
    let addr = start_server();
    let mut alice = connect(addr);
    let mut bob = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");
    register_and_login(&mut bob, "bobby", "secret99");

    send_frame(&mut alice, 5, &send_public_request(false, "hello room"));

    // Sender gets only its own response, not an echo of the broadcast.
    let (msg_type, body) = read_frame(&mut alice);
    assert_eq!(msg_type, 8); // SendPublicMessageResponse
    assert_eq!(body, vec![0]);

    let (msg_type, body) = read_frame(&mut bob);
    assert_eq!(msg_type, 7); // SendPublicMessageEvent
    assert_eq!(body[0], 0); // not anonymous
    let name_len = body[1] as usize;
    assert_eq!(&body[2..2 + name_len], b"alice");
    let msg_off = 2 + name_len;
    let msg_len = u16::from_le_bytes([body[msg_off], body[msg_off + 1]]) as usize;
    assert_eq!(&body[msg_off + 2..msg_off + 2 + msg_len], b"hello room");
}

#[test]
fn anonymous_public_message_omits_sender_name() {
    let addr = start_server();
    let mut alice = connect(addr);
    let mut bob = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");
    register_and_login(&mut bob, "bobby", "secret99");

    // opts = 0b11 exercises the bitwise-AND anonymous check: only bit 0
    // matters, the rest of the byte must not flip the outcome.
    let mut body = Vec::new();
    body.push(0b0000_0011u8);
    let message = b"shh";
    body.extend_from_slice(&(message.len() as u16).to_le_bytes());
    body.extend_from_slice(message);
    send_frame(&mut alice, 5, &body);

    read_frame(&mut alice); // response
    let (msg_type, event_body) = read_frame(&mut bob);
    assert_eq!(msg_type, 7);
    assert_eq!(event_body[0] & 0x01, 1);
    let msg_len = u16::from_le_bytes([event_body[1], event_body[2]]) as usize;
    assert_eq!(&event_body[3..3 + msg_len], b"shh");
}

#[test]
fn private_message_delivers_only_to_named_recipient() {
    let addr = start_server();
    let mut alice = connect(addr);
    let mut bob = connect(addr);
    let mut carol = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");
    register_and_login(&mut bob, "bobby", "secret99");
    register_and_login(&mut carol, "carol", "letmein1");

    send_frame(&mut alice, 4, &send_private_request(false, "bobby", "just us"));
    let (msg_type, body) = read_frame(&mut alice);
    assert_eq!(msg_type, 6); // SendPrivateMessageResponse
    assert_eq!(body, vec![0]);

    let (msg_type, _) = read_frame(&mut bob);
    assert_eq!(msg_type, 5); // SendPrivateMessageEvent

    carol
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut probe = [0u8; 1];
    let result = carol.read(&mut probe);
    assert!(result.is_err(), "carol should not receive alice's private message");
}

#[test]
fn private_message_to_self_is_rejected() {
    let addr = start_server();
    let mut alice = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");

    send_frame(&mut alice, 4, &send_private_request(false, "alice", "hi me"));
    let (msg_type, body) = read_frame(&mut alice);
    assert_eq!(msg_type, 6);
    assert_eq!(body, vec![1]); // CannotMessageSelf
}

#[test]
fn private_message_to_offline_user_reports_not_online() {
    let addr = start_server();
    let mut alice = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");

    send_frame(&mut alice, 4, &send_private_request(false, "nobody1", "hi"));
    let (msg_type, body) = read_frame(&mut alice);
    assert_eq!(msg_type, 6);
    assert_eq!(body, vec![2]); // UserNotOnline
}

#[test]
fn unknown_message_type_gets_header_error_but_connection_stays_open() {
    let addr = start_server();
    let mut stream = connect(addr);

    send_frame(&mut stream, 0xEE, &[]);
    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 0); // HeaderErrorResponse
    assert_eq!(body, vec![1]); // UnknownMessageType

    // Connection is still usable afterwards.
    send_frame(&mut stream, 3, &register_request("alice", "pass1234"));
    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 4);
    assert_eq!(body, vec![0]);
}

#[test]
fn oversize_body_closes_the_connection() {
    let addr = start_server();
    let mut stream = connect(addr);

    // Claim a body larger than the 8189 byte maximum; the server must
    // report the header error and then close rather than wait for a body
    // that would overflow its fixed-size read buffer.
    let mut header = vec![3u8];
    header.extend_from_slice(&0xFFFFu16.to_le_bytes());
    stream.write_all(&header).unwrap();

    let (msg_type, body) = read_frame(&mut stream);
    assert_eq!(msg_type, 0);
    assert_eq!(body, vec![0]); // MaximumMessageSizeExceeded

    let mut probe = [0u8; 1];
    stream.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    let result = stream.read(&mut probe);
    assert!(matches!(result, Ok(0)) || result.is_err());
}

#[test]
fn truncated_field_returns_immediately_without_reading_further_bytes() {
    // Regresses a historical bug where a rejected message length did not
    // stop the parser from continuing to read (and misinterpreting) the
    // rest of the body. A private-message body declaring a message length
    // of zero (invalid: must be 1..=4096) must be rejected without the
    // parser treating any trailing bytes as a second message.
    let addr = start_server();
    let mut alice = connect(addr);
    register_and_login(&mut alice, "alice", "pass1234");

    let mut body = Vec::new();
    body.push(0u8); // opts
    body.push(5u8);
    body.extend_from_slice(b"bobby");
    body.extend_from_slice(&0u16.to_le_bytes()); // invalid message length
    body.extend_from_slice(b"trailing-bytes-that-must-be-ignored");
    send_frame(&mut alice, 4, &body);

    let (msg_type, resp_body) = read_frame(&mut alice);
    assert_eq!(msg_type, 6);
    assert_eq!(resp_body, vec![10]); // InvalidMessageLength

    // The connection must still be in the header phase afterwards, not
    // partway through reinterpreting the trailing bytes as a new frame.
    send_frame(&mut alice, 0, &[]);
    let (msg_type, _) = read_frame(&mut alice);
    assert_eq!(msg_type, 1); // ListUsersResponse
}
