//! Search-then-bind state machine
//!
//! `Init → Connected → BoundAsSearchIdentity → Searched → CandidateSelected →
//! Authenticated`, with every step able to end in a denial. The stage is
//! recorded on the [`RequestContext`] before each step runs.

use ldapgate_core::{DenyReason, RequestContext, Stage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ldap::filter::render_filter;
use crate::ldap::types::*;

/// Verifies a user's password against the directory
#[derive(Clone)]
pub struct LdapAuthenticator {
    connector: Arc<dyn DirectoryConnector>,
    timeout: Duration,
}

impl LdapAuthenticator {
    pub fn new(connector: Arc<dyn DirectoryConnector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Authenticate the credentials held by `ctx`.
    ///
    /// Input checks run before any connection is opened. Once connected, the
    /// connection is unbound whatever the outcome.
    pub async fn authenticate(&self, ctx: &mut RequestContext) -> Result<Authenticated, DenyReason> {
        ctx.enter(Stage::EmptyPasswordCheck);
        let password = match ctx.password() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => return Err(DenyReason::EmptyPassword),
        };
        let user = ctx.user().unwrap_or_default().to_string();

        ctx.enter(Stage::DirectoryParameterCheck);
        let params = ctx.params();
        let url = non_empty(&params.url).ok_or(DenyReason::NotConfigured("LDAP URL"))?;
        let base_dn = non_empty(&params.base_dn).ok_or(DenyReason::NotConfigured("LDAP baseDN"))?;
        let target = ConnectionTarget {
            url,
            start_tls: params.start_tls,
            disable_referrals: params.disable_referrals,
            timeout: self.timeout,
        };

        ctx.enter(Stage::Connecting);
        let mut session = match self.connector.connect(&target).await {
            Ok(session) => session,
            Err(ConnectError::Connect(msg)) => return Err(DenyReason::ConnectionFailure(msg)),
            Err(ConnectError::StartTls(msg)) => {
                ctx.enter(Stage::StartTls);
                return Err(DenyReason::StartTlsFailure(msg));
            }
        };

        let outcome = search_then_bind(ctx, session.as_mut(), &target.url, &base_dn, &user, &password).await;
        session.unbind().await;
        outcome
    }
}

async fn search_then_bind(
    ctx: &mut RequestContext,
    session: &mut dyn DirectorySession,
    url: &str,
    base_dn: &str,
    user: &str,
    password: &str,
) -> Result<Authenticated, DenyReason> {
    ctx.enter(Stage::BindingAsSearchUser);
    let bind_dn = ctx.params().bind_dn.clone();
    let bind_password = ctx.params().bind_password.clone();
    session
        .bind(&bind_dn, &bind_password)
        .await
        .map_err(|e| DenyReason::BindAsSearchUserFailure(e.to_string()))?;

    ctx.enter(Stage::PreparingFilter);
    let filter = render_filter(&ctx.params().template, user)
        .map_err(|e| DenyReason::FilterFailure(e.to_string()))?;

    debug!(
        "searching on server \"{}\" with base dn \"{}\" with filter \"{}\"",
        url, base_dn, filter
    );

    ctx.enter(Stage::Searching);
    let hits = session
        .search(base_dn, &filter)
        .await
        .map_err(|e| DenyReason::SearchFailure(e.to_string()))?;

    ctx.enter(Stage::VerifyingResults);
    let dn = select_candidate(hits, user)?;

    debug!("attempting to bind using dn \"{}\"", dn);
    ctx.enter(Stage::BindingAsUser(dn.clone()));
    session
        .bind(&dn, password)
        .await
        .map_err(|e| DenyReason::FinalBindFailure(e.to_string()))?;

    debug!("Auth OK for user \"{}\"", user);
    Ok(Authenticated { dn })
}

/// First hit in directory order wins
fn select_candidate(hits: Vec<SearchHit>, user: &str) -> Result<String, DenyReason> {
    if hits.len() > 1 {
        warn!(
            matches = hits.len(),
            login = %user,
            "note: filter match multiple objects: {}, using first",
            hits.len()
        );
    }

    match hits.into_iter().next() {
        None => Err(DenyReason::NoObjectFound),
        Some(SearchHit { dn: Some(dn) }) => Ok(dn),
        Some(SearchHit { dn: None }) => Err(DenyReason::NoDn),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
