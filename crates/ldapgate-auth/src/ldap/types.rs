//! Directory abstraction and authentication outcome types

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Connection
// ============================================================================

/// Everything needed to open one directory connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Directory URL (ldap://, ldaps:// or ldapi://)
    pub url: String,
    /// Negotiate STARTTLS before the first bind
    pub start_tls: bool,
    /// Drop referrals instead of surfacing them as candidates
    pub disable_referrals: bool,
    /// Bound on connecting and on every single operation
    pub timeout: Duration,
}

/// Failure to open a directory connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    StartTls(String),
}

/// Fault reported by the directory for a bind or search
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DirectoryError(pub String);

impl DirectoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// One search result; `dn` is `None` for entries without a usable DN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub dn: Option<String>,
}

impl SearchHit {
    pub fn entry(dn: impl Into<String>) -> Self {
        Self { dn: Some(dn.into()) }
    }

    pub fn reference() -> Self {
        Self { dn: None }
    }
}

/// Opens per-request directory sessions
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn DirectorySession>, ConnectError>;
}

/// A single connection, used by exactly one request
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind; empty DN and password bind anonymously
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Subtree search below `base_dn`, returning matches in directory order
    async fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<SearchHit>, DirectoryError>;

    /// Close the connection; errors are ignored
    async fn unbind(&mut self);
}

// ============================================================================
// Authentication Result
// ============================================================================

/// Successful search-then-bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    /// DN the user's password was verified against
    pub dn: String,
}
