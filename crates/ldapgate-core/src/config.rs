//! Configuration for Ldapgate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ldap: LdapConfigSection,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::ConfigLoad(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::ConfigLoad(format!("Failed to parse config: {}", e)))
    }

    /// Overlay `LDAPGATE_*` environment variables; unparsable numbers are ignored
    pub fn apply_env(&mut self) {
        if let Ok(listen) = std::env::var("LDAPGATE_LISTEN") {
            self.server.listen = Some(listen);
        }
        if let Ok(port) = std::env::var("LDAPGATE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = Some(p);
            }
        }
        if let Ok(max) = std::env::var("LDAPGATE_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse() {
                self.server.max_connections = m;
            }
        }
        if let Ok(url) = std::env::var("LDAPGATE_LDAP_URL") {
            self.ldap.url = Some(url);
        }
        if let Ok(base_dn) = std::env::var("LDAPGATE_BASE_DN") {
            self.ldap.base_dn = Some(base_dn);
        }
        if let Ok(bind_dn) = std::env::var("LDAPGATE_BIND_DN") {
            self.ldap.bind_dn = bind_dn;
        }
        if let Ok(password) = std::env::var("LDAPGATE_BIND_PASSWORD") {
            self.ldap.bind_password = password;
        }
        if let Ok(template) = std::env::var("LDAPGATE_FILTER") {
            self.ldap.template = template;
        }
        if let Ok(timeout) = std::env::var("LDAPGATE_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.ldap.timeout_seconds = t;
            }
        }
        if std::env::var("LDAPGATE_STARTTLS").map(|v| v == "true").unwrap_or(false) {
            self.ldap.start_tls = true;
        }
        if std::env::var("LDAPGATE_DISABLE_REFERRALS").map(|v| v == "true").unwrap_or(false) {
            self.ldap.disable_referrals = true;
        }
        if let Ok(realm) = std::env::var("LDAPGATE_REALM") {
            self.http.realm = realm;
        }
        if let Ok(cookie) = std::env::var("LDAPGATE_COOKIE") {
            self.http.cookie_name = cookie;
        }
        if let Ok(level) = std::env::var("LDAPGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LDAPGATE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check the parts of the configuration that can be judged before startup
    pub fn validate(&self) -> crate::Result<()> {
        self.server.listen_target()?;

        if self.server.max_connections == 0 {
            return Err(crate::Error::InvalidConfig(
                "max_connections must be greater than zero".into(),
            ));
        }
        if self.server.max_connections > MAX_CONNECTIONS_LIMIT {
            return Err(crate::Error::InvalidConfig(format!(
                "max_connections must not exceed {}",
                MAX_CONNECTIONS_LIMIT
            )));
        }
        if self.ldap.timeout_seconds == 0 {
            return Err(crate::Error::InvalidConfig(
                "LDAP timeout must be greater than zero".into(),
            ));
        }
        if self.ldap.template.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "search filter template is empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind, or an absolute path for a UNIX domain socket
    #[serde(default)]
    pub listen: Option<String>,
    /// TCP port, required when `listen` is a host name
    #[serde(default)]
    pub port: Option<u16>,
    /// Upper bound on connections served at the same time
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Upper bound accepted for `server.max_connections`
pub const MAX_CONNECTIONS_LIMIT: usize = 1 << 20;

fn default_max_connections() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: None,
            port: None,
            max_connections: default_max_connections(),
        }
    }
}

impl ServerConfig {
    /// Resolve where the daemon should listen.
    ///
    /// A `listen` value starting with `/` is a socket path; anything else is a
    /// host and needs a port. A bare port listens on the loopback address.
    pub fn listen_target(&self) -> crate::Result<ListenTarget> {
        match (self.listen.as_deref(), self.port) {
            (Some(path), _) if path.starts_with('/') => Ok(ListenTarget::Unix(PathBuf::from(path))),
            (Some(_), Some(0)) | (None, Some(0)) => Err(crate::Error::InvalidConfig(
                "port must be greater than zero".into(),
            )),
            (Some(host), Some(port)) => Ok(ListenTarget::Tcp {
                host: host.to_string(),
                port,
            }),
            (Some(host), None) => Err(crate::Error::InvalidConfig(format!(
                "a port is required to listen on host {}",
                host
            ))),
            (None, Some(port)) => Ok(ListenTarget::Tcp {
                host: "127.0.0.1".to_string(),
                port,
            }),
            (None, None) => Ok(ListenTarget::Unix(PathBuf::from(crate::DEFAULT_SOCKET_PATH))),
        }
    }
}

/// Where the daemon accepts connections, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenTarget {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl ListenTarget {
    /// Socket file to remove on shutdown, if any
    pub fn socket_path(&self) -> Option<&PathBuf> {
        match self {
            ListenTarget::Unix(path) => Some(path),
            ListenTarget::Tcp { .. } => None,
        }
    }
}

impl fmt::Display for ListenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenTarget::Tcp { host, port } => write!(f, "{}:{}", host, port),
            ListenTarget::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Directory defaults; every field can be overridden per request by header
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfigSection {
    /// LDAP server URL (ldap:// or ldaps://). Unset makes `X-Ldap-URL` mandatory
    #[serde(default)]
    pub url: Option<String>,

    /// Negotiate STARTTLS before binding
    #[serde(default)]
    pub start_tls: bool,

    /// Do not surface referrals returned by the directory
    #[serde(default)]
    pub disable_referrals: bool,

    /// Search base. Unset makes `X-Ldap-BaseDN` mandatory
    #[serde(default)]
    pub base_dn: Option<String>,

    /// Search filter, `%(username)s` is replaced by the login
    #[serde(default = "default_template")]
    pub template: String,

    /// Bind DN for the search phase, empty for anonymous
    #[serde(default)]
    pub bind_dn: String,

    #[serde(default)]
    pub bind_password: String,

    /// Connect and per-operation timeout in seconds
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,
}

fn default_template() -> String {
    crate::DEFAULT_TEMPLATE.to_string()
}

fn default_ldap_timeout() -> u64 {
    10
}

impl Default for LdapConfigSection {
    fn default() -> Self {
        Self {
            url: None,
            start_tls: false,
            disable_referrals: false,
            base_dn: None,
            template: default_template(),
            bind_dn: String::new(),
            bind_password: String::new(),
            timeout_seconds: default_ldap_timeout(),
        }
    }
}

impl fmt::Debug for LdapConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConfigSection")
            .field("url", &self.url)
            .field("start_tls", &self.start_tls)
            .field("disable_referrals", &self.disable_referrals)
            .field("base_dn", &self.base_dn)
            .field("template", &self.template)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Realm sent in the `WWW-Authenticate` challenge
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Cookie carrying base64 `user:password`; empty disables the lookup
    #[serde(default)]
    pub cookie_name: String,
}

fn default_realm() -> String {
    crate::DEFAULT_REALM.to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            cookie_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
