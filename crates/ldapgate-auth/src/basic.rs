//! HTTP Basic credential decoding

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ldapgate_core::DenyReason;

/// Return the payload of a `Basic` authorization value.
///
/// The scheme token is matched case-insensitively and must be followed by a
/// space.
pub fn basic_payload(header: &str) -> Option<&str> {
    let scheme = header.get(..6)?;
    if scheme.eq_ignore_ascii_case("basic ") {
        Some(&header[6..])
    } else {
        None
    }
}

/// Decode base64 `user:password` into its two parts.
///
/// The split happens on the first `:`, so the password may contain colons.
pub fn decode_basic_credentials(payload: &str) -> Result<(String, String), DenyReason> {
    let decoded = BASE64
        .decode(payload.trim())
        .map_err(|e| DenyReason::MalformedCredentials(format!("invalid base64: {}", e)))?;

    let credentials = String::from_utf8(decoded)
        .map_err(|_| DenyReason::MalformedCredentials("credentials are not valid UTF-8".into()))?;

    match credentials.split_once(':') {
        Some((user, password)) => Ok((user.to_string(), password.to_string())),
        None => Err(DenyReason::MalformedCredentials(
            "missing ':' between username and password".into(),
        )),
    }
}
