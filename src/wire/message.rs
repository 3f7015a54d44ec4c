//! Wire-level message types and response codes.
//!
//! Ordinal values are part of the wire contract and must not be reordered;
//! they are fixed by the binary test vectors this protocol was built
//! against, not by the alphabetical declaration order a reader might expect.

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ClientMessageType {
    ListUsers = 0,
    Login = 1,
    Logout = 2,
    Register = 3,
    SendPrivateMessage = 4,
    SendPublicMessage = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ServerMessageType {
    HeaderErrorResponse = 0,
    ListUsersResponse = 1,
    LoginResponse = 2,
    LogoutResponse = 3,
    RegisterResponse = 4,
    SendPrivateMessageEvent = 5,
    SendPrivateMessageResponse = 6,
    SendPublicMessageEvent = 7,
    SendPublicMessageResponse = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum HeaderErrorCode {
    MaximumMessageSizeExceeded = 0,
    UnknownMessageType = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ListUsersResponseCode {
    Success = 0,
    Unauthenticated = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LoginResponseCode {
    Success = 0,
    UserDoesNotExist = 1,
    IncorrectPassword = 2,
    Unauthorized = 3,
    MissingNameLength = 4,
    InvalidNameLength = 5,
    MissingName = 6,
    InvalidName = 7,
    MissingPasswordLength = 8,
    InvalidPasswordLength = 9,
    MissingPassword = 10,
    InvalidPassword = 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LogoutResponseCode {
    Success = 0,
    Unauthenticated = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RegisterResponseCode {
    Success = 0,
    UserAlreadyRegistered = 1,
    Unauthorized = 2,
    MissingNameLength = 3,
    InvalidNameLength = 4,
    MissingName = 5,
    InvalidName = 6,
    MissingPasswordLength = 7,
    InvalidPasswordLength = 8,
    MissingPassword = 9,
    InvalidPassword = 10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SendPrivateMessageResponseCode {
    Success = 0,
    CannotMessageSelf = 1,
    UserNotOnline = 2,
    Unauthenticated = 3,
    MissingOptions = 4,
    MissingNameLength = 5,
    InvalidNameLength = 6,
    MissingName = 7,
    InvalidName = 8,
    MissingMessageLength = 9,
    InvalidMessageLength = 10,
    MissingMessage = 11,
    InvalidMessage = 12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SendPublicMessageResponseCode {
    Success = 0,
    Unauthenticated = 1,
    MissingOptions = 2,
    MissingMessageLength = 3,
    InvalidMessageLength = 4,
    MissingMessage = 5,
    InvalidMessage = 6,
}

pub const NAME_LEN_RANGE: std::ops::RangeInclusive<u8> = 4..=8;
pub const MESSAGE_LEN_RANGE: std::ops::RangeInclusive<u16> = 1..=4096;

/// Bit in the `opts` byte of send-message frames marking the sender as
/// anonymous. Read and written with bitwise AND/OR, never logical.
pub const ANONYMOUS_BIT: u8 = 0x01;
