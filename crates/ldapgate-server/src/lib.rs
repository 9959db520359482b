//! auth_request endpoint for Ldapgate
//!
//! Serves the HTTP subrequests a reverse proxy sends to decide whether a
//! request may pass, over TCP or a UNIX domain socket.

pub mod listener;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

#[cfg(test)]
mod test_support;

pub use listener::{ClientAddr, Listener};
pub use server::{AppState, AuthServer};
