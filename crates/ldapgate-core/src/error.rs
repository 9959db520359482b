//! Error types for Ldapgate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Process-level errors: configuration, listeners, I/O
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    #[error("Listener error: {0}")]
    Listen(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a single authentication request was denied.
///
/// Every variant ends in the same `401` for the client. The variant, together
/// with the [`Stage`](crate::Stage) it happened in, only feeds the server log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    // Request input
    #[error("required \"{0}\" header was not passed")]
    MissingParameter(&'static str),

    #[error("\"{0}\" header is not valid UTF-8")]
    UnreadableParameter(&'static str),

    #[error("no basic credentials supplied")]
    NoCredentials,

    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),

    #[error("attempt to use empty password")]
    EmptyPassword,

    #[error("{0} is not set")]
    NotConfigured(&'static str),

    // Directory
    #[error("{0}")]
    ConnectionFailure(String),

    #[error("{0}")]
    StartTlsFailure(String),

    #[error("{0}")]
    BindAsSearchUserFailure(String),

    #[error("{0}")]
    FilterFailure(String),

    #[error("{0}")]
    SearchFailure(String),

    #[error("no objects found")]
    NoObjectFound,

    #[error("matched object has no dn")]
    NoDn,

    #[error("{0}")]
    FinalBindFailure(String),

    // Response
    #[error("username cannot be sent as a header value")]
    InvalidIdentity,
}

impl DenyReason {
    /// Stable class name for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            DenyReason::MissingParameter(_) => "MissingParameter",
            DenyReason::UnreadableParameter(_) => "UnreadableParameter",
            DenyReason::NoCredentials => "NoCredentials",
            DenyReason::MalformedCredentials(_) => "MalformedCredentials",
            DenyReason::EmptyPassword => "EmptyPassword",
            DenyReason::NotConfigured(_) => "NotConfigured",
            DenyReason::ConnectionFailure(_) => "ConnectionFailure",
            DenyReason::StartTlsFailure(_) => "StartTLSFailure",
            DenyReason::BindAsSearchUserFailure(_) => "BindAsSearchUserFailure",
            DenyReason::FilterFailure(_) => "FilterFailure",
            DenyReason::SearchFailure(_) => "SearchFailure",
            DenyReason::NoObjectFound => "NoObjectFound",
            DenyReason::NoDn => "NoDN",
            DenyReason::FinalBindFailure(_) => "FinalBindFailure",
            DenyReason::InvalidIdentity => "InvalidIdentity",
        }
    }

    /// True if the directory was (or may have been) contacted
    pub fn is_directory_failure(&self) -> bool {
        matches!(
            self,
            DenyReason::ConnectionFailure(_)
                | DenyReason::StartTlsFailure(_)
                | DenyReason::BindAsSearchUserFailure(_)
                | DenyReason::FilterFailure(_)
                | DenyReason::SearchFailure(_)
                | DenyReason::NoObjectFound
                | DenyReason::NoDn
                | DenyReason::FinalBindFailure(_)
        )
    }
}
