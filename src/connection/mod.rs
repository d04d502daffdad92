//! Connection module
//!
//! This module opens databases and owns everything attached to a connection:
//! - Access mode and engine settings
//! - The engine handle and its lifetime
//! - Registered SQL functions

pub mod config;
pub mod connection;

pub(crate) use connection::error_message;
pub use config::{AccessMode, ConnectionConfig};
pub use connection::{Connection, MEMORY_LOCATOR};
