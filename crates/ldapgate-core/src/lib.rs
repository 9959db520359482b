//! Ldapgate Core Library
//!
//! Configuration, error types and the per-request authentication model
//! shared by the ldapgate crates.

pub mod config;
pub mod context;
pub mod error;

pub use config::{BridgeConfig, ListenTarget};
pub use context::{DirectoryParams, Param, RequestContext, Stage};
pub use error::{DenyReason, Error, Result};

/// Ldapgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Socket path used when no listen target is configured
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/nginx-ldap-auth.sock";

/// Default directory URL offered by the command line
pub const DEFAULT_LDAP_URL: &str = "ldap://localhost:389";

/// Default HTTP authentication realm
pub const DEFAULT_REALM: &str = "Restricted";

/// Default search filter template
pub const DEFAULT_TEMPLATE: &str = "(cn=%(username)s)";

/// Response header carrying the authenticated username (`X-Remote-User`)
pub const REMOTE_USER_HEADER: &str = "x-remote-user";
