//! Per-request authentication state
//!
//! A [`RequestContext`] is created for every request, owned by the task that
//! serves it and dropped when the response is written. It carries the
//! resolved [`DirectoryParams`], the extracted credentials and the [`Stage`]
//! label used to attribute a failure.

use std::fmt;

use crate::config::BridgeConfig;
use crate::error::DenyReason;

// ============================================================================
// Stages
// ============================================================================

/// Processing step a request is in; set before each fallible operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Initializing,
    ParameterCheck,
    Authorization,
    DecodingCredentials,
    EmptyPasswordCheck,
    DirectoryParameterCheck,
    Connecting,
    StartTls,
    BindingAsSearchUser,
    PreparingFilter,
    Searching,
    VerifyingResults,
    BindingAsUser(String),
    SendingResponse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Initializing => f.write_str("initializing basic auth handler"),
            Stage::ParameterCheck => f.write_str("input parameters check"),
            Stage::Authorization => f.write_str("performing authorization"),
            Stage::DecodingCredentials => f.write_str("decoding credentials"),
            Stage::EmptyPasswordCheck => f.write_str("empty password check"),
            Stage::DirectoryParameterCheck => f.write_str("checking directory parameters"),
            Stage::Connecting => f.write_str("initializing LDAP connection"),
            Stage::StartTls => f.write_str("negotiating STARTTLS"),
            Stage::BindingAsSearchUser => f.write_str("binding as search user"),
            Stage::PreparingFilter => f.write_str("preparing search filter"),
            Stage::Searching => f.write_str("running search query"),
            Stage::VerifyingResults => f.write_str("verifying search query results"),
            Stage::BindingAsUser(dn) => write!(f, "binding as an existing user \"{}\"", dn),
            Stage::SendingResponse => f.write_str("sending response"),
        }
    }
}

// ============================================================================
// Parameter table
// ============================================================================

/// A directory parameter that a trusted request header may override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Realm,
    Url,
    StartTls,
    DisableReferrals,
    BaseDn,
    Template,
    BindDn,
    BindPassword,
    CookieName,
}

impl Param {
    /// Resolution order. Realm comes first so a challenge can always use it.
    pub const ALL: [Param; 9] = [
        Param::Realm,
        Param::Url,
        Param::StartTls,
        Param::DisableReferrals,
        Param::BaseDn,
        Param::Template,
        Param::BindDn,
        Param::BindPassword,
        Param::CookieName,
    ];

    /// Name used in log messages
    pub fn key(self) -> &'static str {
        match self {
            Param::Realm => "realm",
            Param::Url => "url",
            Param::StartTls => "starttls",
            Param::DisableReferrals => "disable_referrals",
            Param::BaseDn => "basedn",
            Param::Template => "template",
            Param::BindDn => "binddn",
            Param::BindPassword => "bindpasswd",
            Param::CookieName => "cookiename",
        }
    }

    /// Request header that overrides the parameter
    pub fn header(self) -> &'static str {
        match self {
            Param::Realm => "X-Ldap-Realm",
            Param::Url => "X-Ldap-URL",
            Param::StartTls => "X-Ldap-Starttls",
            Param::DisableReferrals => "X-Ldap-DisableReferrals",
            Param::BaseDn => "X-Ldap-BaseDN",
            Param::Template => "X-Ldap-Template",
            Param::BindDn => "X-Ldap-BindDN",
            Param::BindPassword => "X-Ldap-BindPass",
            Param::CookieName => "X-CookieName",
        }
    }
}

/// Directory parameters in effect for one request
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryParams {
    pub realm: String,
    pub url: Option<String>,
    pub start_tls: bool,
    pub disable_referrals: bool,
    pub base_dn: Option<String>,
    pub template: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub cookie_name: String,
}

impl DirectoryParams {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            realm: config.http.realm.clone(),
            url: config.ldap.url.clone(),
            start_tls: config.ldap.start_tls,
            disable_referrals: config.ldap.disable_referrals,
            base_dn: config.ldap.base_dn.clone(),
            template: config.ldap.template.clone(),
            bind_dn: config.ldap.bind_dn.clone(),
            bind_password: config.ldap.bind_password.clone(),
            cookie_name: config.http.cookie_name.clone(),
        }
    }

    /// Apply header overrides in [`Param::ALL`] order.
    ///
    /// `lookup` returns the raw header value by name. A parameter with no
    /// default and no header stops resolution with
    /// [`DenyReason::MissingParameter`], a header that is not UTF-8 with
    /// [`DenyReason::UnreadableParameter`]. Parameters resolved before the
    /// failing one keep their overridden values.
    pub fn apply_overrides<'a, F>(&mut self, lookup: F) -> Result<(), DenyReason>
    where
        F: Fn(&str) -> Option<&'a [u8]>,
    {
        for param in Param::ALL {
            match lookup(param.header()) {
                Some(raw) => {
                    let value = std::str::from_utf8(raw)
                        .map_err(|_| DenyReason::UnreadableParameter(param.key()))?;
                    self.set(param, value.to_string());
                }
                None if !self.has_default(param) => {
                    return Err(DenyReason::MissingParameter(param.key()));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn has_default(&self, param: Param) -> bool {
        match param {
            Param::Url => self.url.is_some(),
            Param::BaseDn => self.base_dn.is_some(),
            _ => true,
        }
    }

    fn set(&mut self, param: Param, value: String) {
        match param {
            Param::Realm => self.realm = value,
            Param::Url => self.url = Some(value),
            Param::StartTls => self.start_tls = value == "true",
            Param::DisableReferrals => self.disable_referrals = value == "true",
            Param::BaseDn => self.base_dn = Some(value),
            Param::Template => self.template = value,
            Param::BindDn => self.bind_dn = value,
            Param::BindPassword => self.bind_password = value,
            Param::CookieName => self.cookie_name = value,
        }
    }
}

impl fmt::Debug for DirectoryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryParams")
            .field("realm", &self.realm)
            .field("url", &self.url)
            .field("start_tls", &self.start_tls)
            .field("disable_referrals", &self.disable_referrals)
            .field("base_dn", &self.base_dn)
            .field("template", &self.template)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

// ============================================================================
// Request context
// ============================================================================

pub struct RequestContext {
    stage: Stage,
    params: DirectoryParams,
    user: Option<String>,
    password: Option<String>,
}

impl RequestContext {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            stage: Stage::Initializing,
            params: DirectoryParams::from_config(config),
            user: None,
            password: None,
        }
    }

    /// Record the stage about to run
    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn params(&self) -> &DirectoryParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut DirectoryParams {
        &mut self.params
    }

    pub fn set_credentials(&mut self, user: String, password: String) {
        self.user = Some(user);
        self.password = Some(password);
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn realm(&self) -> &str {
        &self.params.realm
    }

    /// Server-side description of a denial.
    ///
    /// `Error while <stage>[: <detail>][, server="<url>"][, login="<user>"]`
    pub fn failure_message(&self, reason: &DenyReason) -> String {
        let mut msg = format!("Error while {}", self.stage);

        let detail = reason.to_string();
        if !detail.is_empty() {
            msg.push_str(": ");
            msg.push_str(&detail);
        }
        if let Some(url) = self.params.url.as_deref().filter(|u| !u.is_empty()) {
            msg.push_str(&format!(", server=\"{}\"", url));
        }
        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            msg.push_str(&format!(", login=\"{}\"", user));
        }
        msg
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("stage", &self.stage)
            .field("params", &self.params)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
