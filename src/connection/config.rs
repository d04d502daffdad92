//! Connection configuration

use std::ffi::c_int;
use std::time::Duration;

use libsqlite3_sys as ffi;

/// How the database is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Open an existing database read-only
    ReadOnly,
    /// Open an existing database for reading and writing
    ReadWrite,
    /// Open for reading and writing, creating the database if needed
    Create,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Access mode
    pub mode: AccessMode,
    /// Interpret `file:` locators as URIs
    pub uri: bool,
    /// How long to retry when the database is locked
    pub busy_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            mode: AccessMode::Create,
            uri: true,
            busy_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access mode
    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable URI locators
    pub fn uri(mut self, uri: bool) -> Self {
        self.uri = uri;
        self
    }

    /// Set the busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Flags for `sqlite3_open_v2`.
    ///
    /// A connection is confined to one thread, so the engine's per-connection
    /// mutex is turned off.
    pub(crate) fn open_flags(&self) -> c_int {
        let mut flags = match self.mode {
            AccessMode::ReadOnly => ffi::SQLITE_OPEN_READONLY,
            AccessMode::ReadWrite => ffi::SQLITE_OPEN_READWRITE,
            AccessMode::Create => ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
        };
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        flags | ffi::SQLITE_OPEN_NOMUTEX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ConnectionConfig::new()
            .mode(AccessMode::ReadOnly)
            .uri(false)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.mode, AccessMode::ReadOnly);
        assert_eq!(config.busy_timeout, Some(Duration::from_millis(250)));
        let flags = config.open_flags();
        assert_ne!(flags & ffi::SQLITE_OPEN_READONLY, 0);
        assert_eq!(flags & ffi::SQLITE_OPEN_CREATE, 0);
        assert_eq!(flags & ffi::SQLITE_OPEN_URI, 0);
    }
}
