//! # Error Module
//!
//! Error types for the `sim_dialer` crate, one enum per failure surface.
//! They use the `thiserror` crate for ergonomic error handling.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to bring up a modem session on a port.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The port exists but the process may not open it.
    #[error("Access denied opening '{port}': {reason}")]
    PermissionDenied { port: String, reason: String },

    /// Any other failure to open the port.
    #[error("Failed to open serial port '{port}': {reason}")]
    Open { port: String, reason: String },

    /// Opening the port did not finish within the probe timeout.
    #[error("Timed out opening serial port '{port}'")]
    Timeout { port: String },

    /// The port opened but the `AT` probe could not be written.
    #[error("Failed to write probe to '{port}': {reason}")]
    ProbeWrite { port: String, reason: String },
}

impl ConnectError {
    /// Classifies an I/O error raised while opening `port`.
    #[must_use]
    pub fn from_io(port: impl Into<String>, err: &io::Error) -> Self {
        let port = port.into();
        let reason = err.to_string();
        let lowered = reason.to_lowercase();
        if err.kind() == io::ErrorKind::PermissionDenied
            || lowered.contains("access denied")
            || lowered.contains("permission denied")
        {
            Self::PermissionDenied { port, reason }
        } else {
            Self::Open { port, reason }
        }
    }

    /// Creates a new probe write error.
    #[must_use]
    pub fn probe_write(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProbeWrite {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure is an access problem the operator can fix.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// No candidate port could be opened.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No available modem port among {attempted:?}")]
    NotFound { attempted: Vec<String> },
}

/// Failure to push a command to the modem.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("Modem transport is not open")]
    NotConnected,

    /// Another command is still being written.
    #[error("Modem is busy with another command")]
    Busy,

    #[error("Failed to write to serial port: {0}")]
    Io(String),
}

/// Failure of a dial request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialError {
    #[error("Invalid phone number format '{0}' (must be +CCXXXXXXXXXX)")]
    InvalidFormat(String),

    #[error("Modem not connected")]
    ModemNotConnected,

    #[error("Modem is busy with another command")]
    ModemBusy,

    /// A call session is already registered for the number.
    #[error("A call to {0} is already in progress")]
    CallInProgress(String),

    #[error("Failed to dial: {0}")]
    WriteFailed(String),
}

impl DialError {
    /// Whether the same request may succeed if repeated later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModemNotConnected | Self::ModemBusy | Self::WriteFailed(_)
        )
    }
}

impl From<WriteError> for DialError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::NotConnected => Self::ModemNotConnected,
            WriteError::Busy => Self::ModemBusy,
            WriteError::Io(reason) => Self::WriteFailed(reason),
        }
    }
}

/// Failure of a hangup request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HangupError {
    #[error("Modem not connected")]
    ModemNotConnected,

    #[error("Modem is busy with another command")]
    ModemBusy,

    #[error("No active call with id '{0}'")]
    CallNotFound(String),

    #[error("Failed to hang up: {0}")]
    WriteFailed(String),
}

impl From<WriteError> for HangupError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::NotConnected => Self::ModemNotConnected,
            WriteError::Busy => Self::ModemBusy,
            WriteError::Io(reason) => Self::WriteFailed(reason),
        }
    }
}

/// Failure reported by a call log store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Call log {0} not found")]
    NotFound(u64),

    #[error("Field '{0}' is required")]
    MissingField(&'static str),
}

/// Failure to load the dialer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates a new invalid configuration error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// A console line that could not be turned into a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unterminated quote")]
    UnterminatedQuote,
}
