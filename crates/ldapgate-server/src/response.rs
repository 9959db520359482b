//! Responses and access log lines
//!
//! Every denial looks the same to the client: `401`, a Basic challenge and
//! `Cache-Control: no-cache`. What went wrong is only written to the log.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{DateTime, Local};
use ldapgate_core::{DenyReason, REMOTE_USER_HEADER};

use crate::listener::ClientAddr;

/// Target for the one-line-per-request access log
pub const ACCESS_LOG_TARGET: &str = "ldapgate::access";

/// Used when the configured realm cannot be carried in a header
const FALLBACK_CHALLENGE: &str = "Basic realm=\"Restricted\"";

/// `200` with the login the client supplied
pub fn authenticated(user: &str) -> Result<Response, DenyReason> {
    let value = HeaderValue::from_str(user).map_err(|_| DenyReason::InvalidIdentity)?;

    let mut response = Response::new(Body::empty());
    response.headers_mut().insert(REMOTE_USER_HEADER, value);
    Ok(response)
}

/// `401` asking for Basic credentials in `realm`
pub fn challenge(realm: &str) -> Response {
    let value = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CHALLENGE));

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// `<client> - <user> [<timestamp>] <message>`
pub fn access_line(
    client: ClientAddr,
    user: Option<&str>,
    at: DateTime<Local>,
    message: &str,
) -> String {
    let user = user.filter(|u| !u.is_empty()).unwrap_or("-");
    format!(
        "{} - {} [{}] {}",
        client,
        user,
        at.format("%d/%b/%Y %H:%M:%S"),
        message
    )
}
