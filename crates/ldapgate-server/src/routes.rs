//! auth_request handler

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    response::Response,
};
use chrono::Local;
use ldapgate_core::{DenyReason, RequestContext, Stage};
use tracing::{info, warn};

use crate::listener::ClientAddr;
use crate::middleware::credentials::extract_credentials;
use crate::response::{self, access_line, ACCESS_LOG_TARGET};
use crate::server::AppState;

/// GET (any path) - decide whether the proxied request may pass
pub async fn authenticate(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let client = parts
        .extensions
        .get::<ClientAddr>()
        .copied()
        .unwrap_or_default();

    let mut ctx = RequestContext::new(&state.config);
    let outcome = process(&state, &mut ctx, &parts.headers).await;

    match outcome {
        Ok(response) => {
            let user = ctx.user().unwrap_or_default();
            info!(
                target: ACCESS_LOG_TARGET,
                "{}",
                access_line(client, Some(user), Local::now(), &format!("Auth OK for user \"{}\"", user))
            );
            response
        }
        Err(reason) => {
            warn!(
                target: ACCESS_LOG_TARGET,
                kind = reason.kind(),
                directory = reason.is_directory_failure(),
                stage = %ctx.stage(),
                "{}",
                access_line(client, ctx.user(), Local::now(), &ctx.failure_message(&reason))
            );
            response::challenge(ctx.realm())
        }
    }
}

async fn process(
    state: &AppState,
    ctx: &mut RequestContext,
    headers: &HeaderMap,
) -> Result<Response, DenyReason> {
    extract_credentials(ctx, headers)?;
    state.authenticator.authenticate(ctx).await?;

    ctx.enter(Stage::SendingResponse);
    response::authenticated(ctx.user().unwrap_or_default())
}
