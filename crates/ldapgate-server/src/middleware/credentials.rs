//! Credential extraction for the auth endpoint
//!
//! Resolves the per-request directory parameters from the trusted `X-Ldap-*`
//! headers, then takes a Basic credential pair from:
//! 1. the configured cookie, whose value is the base64 `user:password` payload
//! 2. otherwise the `Authorization: Basic <base64(user:password)>` header

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use ldapgate_auth::{basic_payload, decode_basic_credentials};
use ldapgate_core::{DenyReason, RequestContext, Stage};
use tracing::debug;

/// Populate `ctx` from the request headers. Never contacts the directory.
pub fn extract_credentials(ctx: &mut RequestContext, headers: &HeaderMap) -> Result<(), DenyReason> {
    ctx.enter(Stage::ParameterCheck);
    ctx.params_mut()
        .apply_overrides(|name| headers.get(name).map(|v| v.as_bytes()))?;

    ctx.enter(Stage::Authorization);
    let source = credential_source(headers, &ctx.params().cookie_name);
    let payload = source
        .as_deref()
        .and_then(basic_payload)
        .ok_or(DenyReason::NoCredentials)?;

    ctx.enter(Stage::DecodingCredentials);
    let (user, password) = decode_basic_credentials(payload)?;
    ctx.set_credentials(user, password);

    Ok(())
}

/// A non-empty auth cookie wins over the `Authorization` header. RFC 6265
/// double quotes around the cookie value are dropped.
fn credential_source(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if !cookie_name.is_empty() {
        let jar = CookieJar::from_headers(headers);
        if let Some(value) = jar.get(cookie_name).map(|c| c.value_trimmed()).filter(|v| !v.is_empty()) {
            debug!("using username/password from cookie {}", cookie_name);
            return Some(format!("Basic {}", value));
        }
    }

    debug!("using username/password from authorization header");
    header_value(headers, AUTHORIZATION.as_str())
}

/// Header value as text; values that are not UTF-8 count as absent
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use ldapgate_core::BridgeConfig;

    // base64("alice:wonderland")
    const ALICE: &str = "YWxpY2U6d29uZGVybGFuZA==";
    // base64("bob:builder")
    const BOB: &str = "Ym9iOmJ1aWxkZXI=";

    fn config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.ldap.url = Some("ldap://dc.example.com".into());
        config.ldap.base_dn = Some("dc=example,dc=com".into());
        config.http.cookie_name = "nginxauth".into();
        config
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_authorization_header() {
        let mut ctx = RequestContext::new(&config());
        let h = headers(&[("authorization", &format!("Basic {}", ALICE))]);

        extract_credentials(&mut ctx, &h).unwrap();

        assert_eq!(ctx.user(), Some("alice"));
        assert_eq!(ctx.password(), Some("wonderland"));
    }

    #[test]
    fn test_cookie_takes_precedence() {
        let mut ctx = RequestContext::new(&config());
        let h = headers(&[
            ("authorization", &format!("Basic {}", ALICE)),
            ("cookie", &format!("theme=dark; nginxauth={}", BOB)),
        ]);

        extract_credentials(&mut ctx, &h).unwrap();

        assert_eq!(ctx.user(), Some("bob"));
        assert_eq!(ctx.password(), Some("builder"));
    }

    #[test]
    fn test_empty_cookie_falls_back_to_header() {
        let mut ctx = RequestContext::new(&config());
        let h = headers(&[
            ("authorization", &format!("Basic {}", ALICE)),
            ("cookie", "nginxauth="),
        ]);

        extract_credentials(&mut ctx, &h).unwrap();
        assert_eq!(ctx.user(), Some("alice"));
    }

    #[test]
    fn test_quoted_cookie_value() {
        let mut ctx = RequestContext::new(&config());
        let h = headers(&[("cookie", &format!("nginxauth=\"{}\"", BOB))]);

        extract_credentials(&mut ctx, &h).unwrap();

        assert_eq!(ctx.user(), Some("bob"));
        assert_eq!(ctx.password(), Some("builder"));
    }

    #[test]
    fn test_utf8_template_override() {
        let mut ctx = RequestContext::new(&config());
        let mut h = headers(&[("authorization", &format!("Basic {}", ALICE))]);
        h.insert(
            "x-ldap-template",
            HeaderValue::from_bytes("(&(cn=%(username)s)(ou=Отдел))".as_bytes()).unwrap(),
        );

        extract_credentials(&mut ctx, &h).unwrap();

        assert_eq!(ctx.params().template, "(&(cn=%(username)s)(ou=Отдел))");
    }

    #[test]
    fn test_undecodable_override_denies() {
        let mut ctx = RequestContext::new(&config());
        let mut h = headers(&[("authorization", &format!("Basic {}", ALICE))]);
        h.insert("x-ldap-basedn", HeaderValue::from_bytes(b"ou=\xff,dc=example").unwrap());

        assert_eq!(
            extract_credentials(&mut ctx, &h),
            Err(DenyReason::UnreadableParameter("basedn"))
        );
        assert_eq!(ctx.user(), None);
    }

    #[test]
    fn test_cookie_ignored_without_cookie_name() {
        let mut config = config();
        config.http.cookie_name = String::new();
        let mut ctx = RequestContext::new(&config);
        let h = headers(&[("cookie", &format!("nginxauth={}", BOB))]);

        assert_eq!(extract_credentials(&mut ctx, &h), Err(DenyReason::NoCredentials));
    }

    #[test]
    fn test_cookie_name_from_header() {
        let mut config = config();
        config.http.cookie_name = String::new();
        let mut ctx = RequestContext::new(&config);
        let h = headers(&[
            ("x-cookiename", "sso"),
            ("cookie", &format!("sso={}", BOB)),
        ]);

        extract_credentials(&mut ctx, &h).unwrap();
        assert_eq!(ctx.user(), Some("bob"));
    }

    #[test]
    fn test_missing_required_parameter() {
        let mut ctx = RequestContext::new(&BridgeConfig::default());
        let h = headers(&[
            ("x-ldap-url", "ldap://dc.example.com"),
            ("authorization", &format!("Basic {}", ALICE)),
        ]);

        assert_eq!(
            extract_credentials(&mut ctx, &h),
            Err(DenyReason::MissingParameter("basedn"))
        );
        assert_eq!(*ctx.stage(), Stage::ParameterCheck);
        assert_eq!(ctx.user(), None);
    }

    #[test]
    fn test_no_credentials() {
        let mut ctx = RequestContext::new(&config());
        assert_eq!(
            extract_credentials(&mut ctx, &HeaderMap::new()),
            Err(DenyReason::NoCredentials)
        );

        let mut ctx = RequestContext::new(&config());
        let h = headers(&[("authorization", "Bearer abc.def")]);
        assert_eq!(extract_credentials(&mut ctx, &h), Err(DenyReason::NoCredentials));
        assert_eq!(*ctx.stage(), Stage::Authorization);
    }

    #[test]
    fn test_malformed_credentials() {
        let mut ctx = RequestContext::new(&config());
        let h = headers(&[("authorization", "Basic !!!")]);

        assert!(matches!(
            extract_credentials(&mut ctx, &h),
            Err(DenyReason::MalformedCredentials(_))
        ));
        assert_eq!(*ctx.stage(), Stage::DecodingCredentials);
    }

    #[test]
    fn test_lowercase_scheme() {
        let mut ctx = RequestContext::new(&config());
        let h = headers(&[("authorization", &format!("basic {}", ALICE))]);

        extract_credentials(&mut ctx, &h).unwrap();
        assert_eq!(ctx.user(), Some("alice"));
    }
}
