//! Authentication for Ldapgate
//!
//! Basic credential decoding and search-then-bind verification against an
//! LDAP directory.

pub mod basic;
pub mod ldap;

pub use basic::{basic_payload, decode_basic_credentials};
pub use ldap::{
    render_filter, Authenticated, ConnectError, ConnectionTarget, DirectoryConnector,
    DirectoryError, DirectorySession, FilterError, LdapAuthenticator, LdapConnector, SearchHit,
};
