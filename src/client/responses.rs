//! Decodes and prints server responses and events, mirroring the original
//! client's `parse_and_handle_*` family.

use crate::buffer::ReadBuffer;
use crate::wire::codec::{is_anonymous, read_raw_str_u16len, read_raw_str_u8len};
use crate::wire::message::{
    HeaderErrorCode, ListUsersResponseCode, LoginResponseCode, LogoutResponseCode,
    RegisterResponseCode, SendPrivateMessageResponseCode, SendPublicMessageResponseCode,
    ServerMessageType,
};

/// Decode the body already sitting in `buf` for `msg_type` and print the
/// result to stdout, exactly as the original client's console output did.
pub fn print_response(msg_type: ServerMessageType, buf: &mut ReadBuffer) {
    match msg_type {
        ServerMessageType::HeaderErrorResponse => print_header_error(buf),
        ServerMessageType::ListUsersResponse => print_list_users(buf),
        ServerMessageType::LoginResponse => print_login(buf),
        ServerMessageType::LogoutResponse => print_logout(buf),
        ServerMessageType::RegisterResponse => print_register(buf),
        ServerMessageType::SendPrivateMessageEvent => print_private_event(buf),
        ServerMessageType::SendPrivateMessageResponse => print_private_response(buf),
        ServerMessageType::SendPublicMessageEvent => print_public_event(buf),
        ServerMessageType::SendPublicMessageResponse => print_public_response(buf),
    }
}

fn print_header_error(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    let text = match HeaderErrorCode::try_from(code_byte) {
        Ok(HeaderErrorCode::MaximumMessageSizeExceeded) => "Maximum message size exceeded",
        Ok(HeaderErrorCode::UnknownMessageType) => "Unknown message type",
        Err(_) => "Unrecognized error code",
    };
    println!("<*SERVER*>: Message header error - {text} (this is a bug)");
}

fn print_list_users(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    match ListUsersResponseCode::try_from(code_byte) {
        Ok(ListUsersResponseCode::Success) => {
            let Some(count) = buf.read_u8() else { return };
            println!("<*SERVER*>: {count} user(s) online:");
            for _ in 0..count {
                if let Some(name) = read_raw_str_u8len(buf) {
                    println!(" - {name}");
                }
            }
        }
        Ok(ListUsersResponseCode::Unauthenticated) => {
            println!("<*SERVER*> List users error - Not logged in");
        }
        Err(_) => {}
    }
}

fn print_login(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    let text = match LoginResponseCode::try_from(code_byte) {
        Ok(LoginResponseCode::Success) => {
            println!("<*SERVER*>: Successfully logged in");
            return;
        }
        Ok(LoginResponseCode::IncorrectPassword) => "Incorrect password",
        Ok(LoginResponseCode::InvalidName) => {
            "Invalid name (name can contain only alphanumerical characters)"
        }
        Ok(LoginResponseCode::InvalidNameLength) => {
            "Invalid name length (name must be between 4 and 8 characters)"
        }
        Ok(LoginResponseCode::InvalidPassword) => {
            "Invalid password (password can contain only alphanumerical characters)"
        }
        Ok(LoginResponseCode::InvalidPasswordLength) => {
            "Invalid password length (password must be between 4 and 8 characters)"
        }
        Ok(LoginResponseCode::MissingName) => "Missing name (this is a bug)",
        Ok(LoginResponseCode::MissingNameLength) => "Missing name length (this is a bug)",
        Ok(LoginResponseCode::MissingPassword) => "Missing password (this is a bug)",
        Ok(LoginResponseCode::MissingPasswordLength) => "Missing password length (this is a bug)",
        Ok(LoginResponseCode::Unauthorized) => "Already logged in",
        Ok(LoginResponseCode::UserDoesNotExist) => "User does not exist",
        Err(_) => return,
    };
    println!("<*SERVER*>: Login error - {text}");
}

fn print_logout(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    match LogoutResponseCode::try_from(code_byte) {
        Ok(LogoutResponseCode::Success) => println!("<*SERVER*>: Successfully logged out"),
        Ok(LogoutResponseCode::Unauthenticated) => {
            println!("<*SERVER*>: Logout error - Not logged in");
        }
        Err(_) => {}
    }
}

fn print_register(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    let text = match RegisterResponseCode::try_from(code_byte) {
        Ok(RegisterResponseCode::Success) => {
            println!("<*SERVER*>: Successfully registered (you can login now)");
            return;
        }
        Ok(RegisterResponseCode::InvalidName) => {
            "Invalid name (name can contain only alphanumerical characters)"
        }
        Ok(RegisterResponseCode::InvalidNameLength) => {
            "Invalid name length (name must be between 4 and 8 characters)"
        }
        Ok(RegisterResponseCode::InvalidPassword) => {
            "Invalid password (password can contain only alphanumerical characters)"
        }
        Ok(RegisterResponseCode::InvalidPasswordLength) => {
            "Invalid password length (password must be between 4 and 8 characters)"
        }
        Ok(RegisterResponseCode::MissingName) => "Missing name (this is a bug)",
        Ok(RegisterResponseCode::MissingNameLength) => "Missing name length (this is a bug)",
        Ok(RegisterResponseCode::MissingPassword) => "Missing password (this is a bug)",
        Ok(RegisterResponseCode::MissingPasswordLength) => "Missing password length (this is a bug)",
        Ok(RegisterResponseCode::Unauthorized) => "Cannot register when logged in",
        Ok(RegisterResponseCode::UserAlreadyRegistered) => "User already registered",
        Err(_) => return,
    };
    println!("<*SERVER*>: Register error - {text}");
}

fn read_opts_and_attribution(buf: &mut ReadBuffer) -> Option<(bool, Option<String>)> {
    let opts = buf.read_u8()?;
    let anonymous = is_anonymous(opts);
    let name = if anonymous { None } else { Some(read_raw_str_u8len(buf)?) };
    Some((anonymous, name))
}

fn print_private_event(buf: &mut ReadBuffer) {
    let Some((anonymous, name)) = read_opts_and_attribution(buf) else { return };
    let Some(message) = read_raw_str_u16len(buf) else { return };
    match name {
        Some(name) => println!("<~{name}~>: {message}"),
        None => println!("<~ANONYMOUS~>: {message}"),
    }
    let _ = anonymous;
}

fn print_public_event(buf: &mut ReadBuffer) {
    let Some((anonymous, name)) = read_opts_and_attribution(buf) else { return };
    let Some(message) = read_raw_str_u16len(buf) else { return };
    match name {
        Some(name) => println!("<{name}>: {message}"),
        None => println!("<*ANONYMOUS*>: {message}"),
    }
    let _ = anonymous;
}

fn print_private_response(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    let text = match SendPrivateMessageResponseCode::try_from(code_byte) {
        Ok(SendPrivateMessageResponseCode::Success) => return,
        Ok(SendPrivateMessageResponseCode::CannotMessageSelf) => "Cannot private message yourself",
        Ok(SendPrivateMessageResponseCode::InvalidMessage) => {
            "Invalid message (message can only contain printable characters)"
        }
        Ok(SendPrivateMessageResponseCode::InvalidMessageLength) => {
            "Invalid message length (message must be between 1 and 4096 characters)"
        }
        Ok(SendPrivateMessageResponseCode::InvalidName) => {
            "Invalid name (name can contain only alphanumerical characters)"
        }
        Ok(SendPrivateMessageResponseCode::InvalidNameLength) => {
            "Invalid name length (name must be between 4 and 8 characters)"
        }
        Ok(SendPrivateMessageResponseCode::MissingMessage) => "Missing message (this is a bug)",
        Ok(SendPrivateMessageResponseCode::MissingMessageLength) => {
            "Missing message length (this is a bug)"
        }
        Ok(SendPrivateMessageResponseCode::MissingName) => "Missing name (this is a bug)",
        Ok(SendPrivateMessageResponseCode::MissingNameLength) => {
            "Missing name length (this is a bug)"
        }
        Ok(SendPrivateMessageResponseCode::MissingOptions) => "Missing options (this is a bug)",
        Ok(SendPrivateMessageResponseCode::Unauthenticated) => "Not logged in",
        Ok(SendPrivateMessageResponseCode::UserNotOnline) => "No such user",
        Err(_) => return,
    };
    println!("<*SERVER*>: Send private message error - {text}");
}

fn print_public_response(buf: &mut ReadBuffer) {
    let Some(code_byte) = buf.read_u8() else { return };
    let text = match SendPublicMessageResponseCode::try_from(code_byte) {
        Ok(SendPublicMessageResponseCode::Success) => return,
        Ok(SendPublicMessageResponseCode::InvalidMessage) => {
            "Invalid message (message can only contain printable characters)"
        }
        Ok(SendPublicMessageResponseCode::InvalidMessageLength) => {
            "Invalid message length (message must be between 1 and 4096 characters)"
        }
        Ok(SendPublicMessageResponseCode::MissingMessage) => "Missing message (this is a bug)",
        Ok(SendPublicMessageResponseCode::MissingMessageLength) => {
            "Missing message length (this is a bug)"
        }
        Ok(SendPublicMessageResponseCode::MissingOptions) => "Missing options (this is a bug)",
        Ok(SendPublicMessageResponseCode::Unauthenticated) => "Not logged in",
        Err(_) => return,
    };
    println!("<*SERVER*>: Send message error - {text}");
}
