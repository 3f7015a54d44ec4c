//! The wire protocol: message type and response code enums plus the
//! encode/decode primitives built on top of [`crate::buffer`].

pub mod codec;
pub mod message;
