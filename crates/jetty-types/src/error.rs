//! Error types for the Jetty starter.

use std::io;

/// Errors produced by the console core and the launcher.
///
/// [`ConsoleError::Argument`] is the only variant that represents a user
/// mistake. Everything else is a fault and is reported with its cause chain.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Malformed or missing command arguments. Printed without detail.
    #[error("{0}")]
    Argument(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl ConsoleError {
    /// Shorthand for an argument error.
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// Whether this error is a user input mistake rather than a fault.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Argument(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_error_display_is_bare_message() {
        let e = ConsoleError::argument("Invalid thread ID: 42");
        assert_eq!(format!("{e}"), "Invalid thread ID: 42");
    }

    #[test]
    fn command_error_display() {
        let e = ConsoleError::Command("boom".into());
        assert_eq!(format!("{e}"), "command error: boom");
    }

    #[test]
    fn discovery_error_display() {
        let e = ConsoleError::Discovery("no factory".into());
        assert_eq!(format!("{e}"), "discovery error: no factory");
    }

    #[test]
    fn server_error_display() {
        let e = ConsoleError::Server("not running".into());
        assert_eq!(format!("{e}"), "server error: not running");
    }

    #[test]
    fn only_argument_is_usage_error() {
        assert!(ConsoleError::argument("x").is_usage_error());
        assert!(!ConsoleError::Command("x".into()).is_usage_error());
        assert!(!ConsoleError::Config("x".into()).is_usage_error());
        let io_err: ConsoleError = io::Error::other("x").into();
        assert!(!io_err.is_usage_error());
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: ConsoleError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: ConsoleError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error as _;
        let e: ConsoleError = io::Error::other("disk").into();
        assert!(e.source().is_some());
    }
}
