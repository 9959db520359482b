//! LDAP Client implementation
//!
//! Opens one `ldap3` connection per request. ldap3 always speaks LDAPv3, so
//! STARTTLS is negotiated as part of connecting.

use async_trait::async_trait;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions,
    SearchResult,
};
use std::time::Duration;
use tracing::{debug, warn};

use crate::ldap::types::*;

/// LDAP result code for a referral
const RC_REFERRAL: u32 = 10;

/// [`DirectoryConnector`] backed by `ldap3`
#[derive(Debug, Clone, Default)]
pub struct LdapConnector;

impl LdapConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn DirectorySession>, ConnectError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(target.timeout)
            .set_starttls(target.start_tls);

        debug!("Connecting to LDAP server: {}", target.url);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &target.url)
            .await
            .map_err(|e| classify_connect_error(e, target.start_tls))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });

        Ok(Box::new(LdapSession {
            ldap,
            timeout: target.timeout,
            disable_referrals: target.disable_referrals,
        }))
    }
}

/// With STARTTLS requested, a refused extended operation or a TLS error is
/// the negotiation failing. Anything else is a connection failure.
fn classify_connect_error(err: LdapError, start_tls: bool) -> ConnectError {
    let negotiation = matches!(err, LdapError::LdapResult { .. } | LdapError::Rustls { .. });
    if start_tls && negotiation {
        ConnectError::StartTls(format!("STARTTLS negotiation failed: {}", err))
    } else {
        ConnectError::Connect(format!("Failed to connect to LDAP server: {}", err))
    }
}

struct LdapSession {
    ldap: Ldap,
    timeout: Duration,
    disable_referrals: bool,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .and_then(|res| res.success())
            .map(|_| ())
            .map_err(|e| DirectoryError::new(e.to_string()))
    }

    async fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<SearchHit>, DirectoryError> {
        // Only the DN and the fact of a match matter; ask for attribute
        // types only.
        let SearchResult(entries, result) = self
            .ldap
            .with_search_options(SearchOptions::new().typesonly(true))
            .with_timeout(self.timeout)
            .search(base_dn, Scope::Subtree, filter, vec!["objectClass"])
            .await
            .map_err(|e| DirectoryError::new(e.to_string()))?;

        if !(self.disable_referrals && result.rc == RC_REFERRAL) {
            result
                .success()
                .map_err(|e| DirectoryError::new(e.to_string()))?;
        }

        let hits = entries
            .into_iter()
            .filter(|entry| !entry.is_intermediate())
            .filter_map(|entry| {
                if entry.is_ref() {
                    return (!self.disable_referrals).then(SearchHit::reference);
                }
                let entry = SearchEntry::construct(entry);
                Some(SearchHit {
                    dn: Some(entry.dn).filter(|dn| !dn.is_empty()),
                })
            })
            .collect();

        Ok(hits)
    }

    async fn unbind(&mut self) {
        let _ = self.ldap.unbind().await;
    }
}
