//! `chatnet`: a multi-user chat server and client speaking a small
//! length-prefixed binary protocol over TCP.
//!
//! The server ([`server::ChatServer`]) is a single-threaded, `mio`-driven
//! event loop; the client ([`client::ClientDriver`]) pairs a blocking
//! command thread with a non-blocking network pump. [`buffer`] and [`wire`]
//! hold the shared framing and codec primitives both sides build on.

pub mod buffer;
pub mod client;
pub mod connection;
pub mod domain;
pub mod server;
pub mod wire;

pub use server::ChatServer;
