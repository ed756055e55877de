//! Error types for circuitscan.

use std::io;
use thiserror::Error;

/// Main error type for circuitscan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Target inventory loading errors
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Report output errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key changed since it was last recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged {
        host: String,
        port: u16,
        line: usize,
    },

    /// Host key is not in known_hosts and strict checking is on
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts file could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session layer errors (prompt matching, command execution, enable mode).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not opened yet
    #[error("Session not connected - call open() first")]
    NotConnected,

    /// Session already opened
    #[error("Session already connected")]
    AlreadyConnected,

    /// Prompt not seen within the timeout
    #[error("Prompt not found within {0:?}")]
    PromptTimeout(std::time::Duration),

    /// Device rejected a command
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Enable escalation did not reach the privileged prompt
    #[error("Failed to enter enable mode")]
    EnableFailed,

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Invalid prompt pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Target inventory errors. These are run-fatal.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// I/O error reading the target list
    #[error("Failed to read target list: {0}")]
    Io(#[from] io::Error),

    /// Malformed CSV input
    #[error("Failed to parse target list: {0}")]
    Csv(#[from] csv::Error),

    /// No recognizable address column in a CSV header
    #[error("No address column found (tried aliases: {tried})")]
    MissingAddressColumn { tried: String },

    /// The list parsed but contained no targets
    #[error("Target list '{path}' is empty")]
    Empty { path: String },
}

/// Report output errors. These are run-fatal.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Workbook construction or save failure
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// I/O error writing an output file
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Per-target failure classification attached to error-stub reports.
///
/// Parse gaps are deliberately not represented here: an absent field is
/// the expected steady state for heterogeneous configs, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Host unreachable or session timed out
    Connection,
    /// Credentials rejected
    Auth,
    /// Device returned an error for a command
    Command,
}

impl FailureKind {
    /// Classify an error into the per-target failure taxonomy.
    pub fn classify(error: &Error) -> Self {
        match error {
            Error::Transport(TransportError::AuthenticationFailed { .. }) => Self::Auth,
            Error::Transport(_) => Self::Connection,
            Error::Session(SessionError::CommandFailed { .. }) => Self::Command,
            Error::Session(SessionError::PromptTimeout(_)) => Self::Connection,
            Error::Session(_) => Self::Command,
            // Inventory and report errors are run-fatal and never reach a
            // per-target stub
            _ => Self::Command,
        }
    }

    /// Tag written into the report column for a failed device.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Connection => "ConnectionFailure",
            Self::Auth => "AuthFailure",
            Self::Command => "CommandFailure",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result type alias using circuitscan's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_failure() {
        let err = Error::Transport(TransportError::AuthenticationFailed {
            user: "admin".to_string(),
        });
        assert_eq!(FailureKind::classify(&err), FailureKind::Auth);
    }

    #[test]
    fn test_classify_timeouts_as_connection() {
        let err = Error::Transport(TransportError::Timeout(std::time::Duration::from_secs(30)));
        assert_eq!(FailureKind::classify(&err), FailureKind::Connection);

        let err = Error::Session(SessionError::PromptTimeout(
            std::time::Duration::from_secs(30),
        ));
        assert_eq!(FailureKind::classify(&err), FailureKind::Connection);
    }

    #[test]
    fn test_classify_command_failure() {
        let err = Error::Session(SessionError::CommandFailed {
            command: "show vrf".to_string(),
            message: "% Invalid input detected".to_string(),
        });
        assert_eq!(FailureKind::classify(&err), FailureKind::Command);
        assert_eq!(FailureKind::Command.tag(), "CommandFailure");
    }
}
