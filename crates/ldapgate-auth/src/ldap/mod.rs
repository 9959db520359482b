//! LDAP authentication module
//!
//! Implements the two-phase search-then-bind check:
//! - bind as the configured search identity (or anonymously)
//! - search the base DN for the login with the filter template
//! - re-bind as the matched DN with the user's password
//!
//! The directory is reached through the [`DirectoryConnector`] seam so the
//! state machine can run against a scripted directory in tests.

mod authenticator;
mod client;
mod filter;
mod types;

pub use authenticator::LdapAuthenticator;
pub use client::LdapConnector;
pub use filter::{render_filter, FilterError};
pub use types::*;
