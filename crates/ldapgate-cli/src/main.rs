//! Ldapgate - LDAP authentication helper for reverse proxy auth_request
//!
//! Answers the proxy's subrequests with `200` and the user's login, or with a
//! `401` Basic challenge.

use clap::Parser;
use ldapgate_core::{config::BridgeConfig, DEFAULT_LDAP_URL};
use ldapgate_server::AuthServer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ldapgate")]
#[command(author = "Ldapgate Team")]
#[command(version = ldapgate_core::VERSION)]
#[command(about = "LDAP authentication daemon for nginx auth_request", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(long, env = "LDAPGATE_CONFIG")]
    config: Option<String>,

    /// Host to bind, or a path starting with '/' for a UNIX socket
    #[arg(long, env = "LDAPGATE_LISTEN")]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long, env = "LDAPGATE_PORT")]
    port: Option<u16>,

    /// LDAP URI to query [default: ldap://localhost:389]
    #[arg(short, long, env = "LDAPGATE_LDAP_URL")]
    url: Option<String>,

    /// Establish a STARTTLS protected session
    #[arg(short = 's', long, env = "LDAPGATE_STARTTLS")]
    starttls: bool,

    /// Do not follow LDAP referrals
    #[arg(long, env = "LDAPGATE_DISABLE_REFERRALS")]
    disable_referrals: bool,

    /// LDAP base DN
    #[arg(short = 'b', long = "basedn", env = "LDAPGATE_BASE_DN")]
    base_dn: Option<String>,

    /// LDAP bind DN, anonymous when unset
    #[arg(short = 'D', long = "binddn", env = "LDAPGATE_BIND_DN")]
    bind_dn: Option<String>,

    /// LDAP password for the bind DN
    #[arg(short = 'w', long = "bindpw", env = "LDAPGATE_BIND_PASSWORD", hide_env_values = true)]
    bind_password: Option<String>,

    /// LDAP search filter template
    #[arg(short = 'f', long = "filter", env = "LDAPGATE_FILTER")]
    filter: Option<String>,

    /// HTTP auth realm
    #[arg(short = 'R', long, env = "LDAPGATE_REALM")]
    realm: Option<String>,

    /// HTTP cookie name carrying base64 credentials
    #[arg(short = 'c', long, env = "LDAPGATE_COOKIE")]
    cookie: Option<String>,

    /// Maximum number of connections served at once
    #[arg(long, env = "LDAPGATE_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// LDAP connect and operation timeout in seconds
    #[arg(long, env = "LDAPGATE_TIMEOUT")]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LDAPGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, env = "LDAPGATE_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli)?;

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting ldapgate {}", ldapgate_core::VERSION);
    AuthServer::new(config).run().await?;

    Ok(())
}

/// Defaults, then the config file, then `LDAPGATE_*`, then flags
fn load_config(cli: Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    config.apply_env();

    if let Some(host) = cli.host {
        config.server.listen = Some(host);
    }
    if let Some(port) = cli.port {
        config.server.port = Some(port);
    }
    if let Some(max) = cli.max_connections {
        config.server.max_connections = max;
    }
    if let Some(url) = cli.url {
        config.ldap.url = Some(url);
    }
    if cli.starttls {
        config.ldap.start_tls = true;
    }
    if cli.disable_referrals {
        config.ldap.disable_referrals = true;
    }
    if let Some(base_dn) = cli.base_dn {
        config.ldap.base_dn = Some(base_dn);
    }
    if let Some(bind_dn) = cli.bind_dn {
        config.ldap.bind_dn = bind_dn;
    }
    if let Some(password) = cli.bind_password {
        config.ldap.bind_password = password;
    }
    if let Some(filter) = cli.filter {
        config.ldap.template = filter;
    }
    if let Some(timeout) = cli.timeout {
        config.ldap.timeout_seconds = timeout;
    }
    if let Some(realm) = cli.realm {
        config.http.realm = realm;
    }
    if let Some(cookie) = cli.cookie {
        config.http.cookie_name = cookie;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    config
        .ldap
        .url
        .get_or_insert_with(|| DEFAULT_LDAP_URL.to_string());

    Ok(config)
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if format == "json" {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}
