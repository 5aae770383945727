//! Error types for Dirgate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// LDAP result code returned when a bind is rejected for bad credentials
pub const RESULT_INVALID_CREDENTIALS: u32 = 49;

#[derive(Error, Debug)]
pub enum Error {
    // Authentication Errors
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Can't find user in LDAP")]
    CouldNotFindUser,

    #[error("Did not find a user")]
    DidNotFindUser,

    // Setup Errors
    #[error("No LDAP servers are configured")]
    NoServersConfigured,

    #[error("LDAP not enabled")]
    NotEnabled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Transport Errors
    #[error("Failed to connect to {address}: {message}")]
    Dial { address: String, message: String },

    #[error("Connection to {address} failed: {message}")]
    Transport { address: String, message: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("LDAP result code {code}: {message}")]
    Protocol { code: u32, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Errors that let the server iteration move on to the next server
    pub fn is_silent(&self) -> bool {
        matches!(self, Error::InvalidCredentials | Error::CouldNotFindUser)
    }

    /// Result code of a rejected directory operation, if any
    pub fn result_code(&self) -> Option<u32> {
        match self {
            Error::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "InvalidCredentials",
            Error::CouldNotFindUser => "CouldNotFindUser",
            Error::DidNotFindUser => "DidNotFindUser",
            Error::NoServersConfigured => "NoServersConfigured",
            Error::NotEnabled => "NotEnabled",
            Error::Config(_) => "InvalidConfiguration",
            Error::Dial { .. } => "ConnectionFailed",
            Error::Transport { .. } => "ConnectionFailed",
            Error::Tls(_) => "TlsError",
            Error::Protocol { .. } => "DirectoryError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }
}
