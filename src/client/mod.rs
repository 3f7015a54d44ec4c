//! The interactive client: command parsing, response printing, and the
//! two-thread connection driver.

pub mod commands;
pub mod driver;
pub mod responses;

pub use driver::ClientDriver;
