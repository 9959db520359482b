//! In-memory directory for handler and server tests

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use ldapgate_auth::{
    ConnectError, ConnectionTarget, DirectoryConnector, DirectoryError, DirectorySession,
    LdapAuthenticator, SearchHit,
};
use ldapgate_core::BridgeConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::server::AppState;

pub const ALICE_DN: &str = "cn=alice,ou=people,dc=example,dc=com";

/// Accepts any search bind and "wonderland" for every DN it returns
pub struct StubDirectory {
    hits: Vec<SearchHit>,
    connects: AtomicUsize,
    calls: Arc<Mutex<Calls>>,
}

#[derive(Default)]
struct Calls {
    url: Option<String>,
    filter: Option<String>,
    bind: Option<String>,
}

struct StubSession {
    hits: Vec<SearchHit>,
    calls: Arc<Mutex<Calls>>,
}

impl StubDirectory {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            connects: AtomicUsize::new(0),
            calls: Arc::default(),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.calls.lock().unwrap().url.clone()
    }

    pub fn last_filter(&self) -> Option<String> {
        self.calls.lock().unwrap().filter.clone()
    }

    /// Last DN bound as, search user included
    pub fn last_bind(&self) -> Option<String> {
        self.calls.lock().unwrap().bind.clone()
    }
}

#[async_trait]
impl DirectoryConnector for StubDirectory {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn DirectorySession>, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().url = Some(target.url.clone());
        Ok(Box::new(StubSession {
            hits: self.hits.clone(),
            calls: self.calls.clone(),
        }))
    }
}

#[async_trait]
impl DirectorySession for StubSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.calls.lock().unwrap().bind = Some(dn.to_string());
        let is_candidate = self.hits.iter().any(|h| h.dn.as_deref() == Some(dn));
        if is_candidate && password != "wonderland" {
            return Err(DirectoryError::new("invalidCredentials"));
        }
        Ok(())
    }

    async fn search(&mut self, _base_dn: &str, filter: &str) -> Result<Vec<SearchHit>, DirectoryError> {
        self.calls.lock().unwrap().filter = Some(filter.to_string());
        Ok(self.hits.clone())
    }

    async fn unbind(&mut self) {}
}

/// `Basic <base64(user:password)>`
pub fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Config with a cookie name; `directory` also sets the URL and base DN
pub fn config(directory: bool) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.http.cookie_name = "nginxauth".into();
    if directory {
        config.ldap.url = Some("ldap://localhost:389".into());
        config.ldap.base_dn = Some("dc=example,dc=com".into());
    }
    config
}

pub fn state(dir: Arc<StubDirectory>, directory: bool) -> AppState {
    AppState {
        config: Arc::new(config(directory)),
        authenticator: LdapAuthenticator::new(dir, Duration::from_secs(5)),
    }
}
