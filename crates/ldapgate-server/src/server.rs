//! auth_request server

use axum::{routing::get, Router};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use ldapgate_auth::{render_filter, DirectoryConnector, LdapAuthenticator, LdapConnector};
use ldapgate_core::{config::BridgeConfig, Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tower_service::Service as _;
use tracing::{debug, error, info};

use crate::listener::{self, ClientAddr, Connection, Listener};
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub authenticator: LdapAuthenticator,
}

/// auth_request server
pub struct AuthServer {
    config: BridgeConfig,
    connector: Arc<dyn DirectoryConnector>,
}

impl AuthServer {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_connector(config, Arc::new(LdapConnector::new()))
    }

    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { config, connector }
    }

    /// Listen until SIGINT or SIGTERM, then remove the socket file if any
    pub async fn run(self) -> Result<()> {
        self.config.validate()?;
        render_filter(&self.config.ldap.template, "user")
            .map_err(|e| Error::InvalidConfig(format!("search filter template: {}", e)))?;

        let target = self.config.server.listen_target()?;
        let max_connections = self.config.server.max_connections;
        let app = create_router(self.state());

        let listener = Listener::bind(&target).await?;
        info!("Start listening on {}...", target);

        serve(listener, app, max_connections, shutdown_signal()).await;

        listener::cleanup(&target);
        Ok(())
    }

    fn state(&self) -> AppState {
        let timeout = Duration::from_secs(self.config.ldap.timeout_seconds);
        AppState {
            config: Arc::new(self.config.clone()),
            authenticator: LdapAuthenticator::new(self.connector.clone(), timeout),
        }
    }
}

/// Every path answers GET the same way; other methods get `405`
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::authenticate))
        .route("/{*path}", get(routes::authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accept connections until `shutdown` resolves, each served on its own task.
///
/// At most `max_connections` are served at once; further connections wait in
/// the listen backlog.
pub async fn serve(
    listener: Listener,
    app: Router,
    max_connections: usize,
    shutdown: impl Future<Output = ()>,
) {
    let permits = Arc::new(Semaphore::new(max_connections.clamp(1, Semaphore::MAX_PERMITS)));
    tokio::pin!(shutdown);

    loop {
        let permit = tokio::select! {
            _ = &mut shutdown => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let conn = tokio::select! {
            _ = &mut shutdown => break,
            conn = listener.accept() => match conn {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        let app = app.clone();
        tokio::spawn(async move {
            match conn {
                Connection::Tcp(stream, addr) => serve_connection(stream, addr.into(), app).await,
                Connection::Unix(stream) => serve_connection(stream, ClientAddr::default(), app).await,
            }
            drop(permit);
        });
    }

    info!("Shutting down");
}

async fn serve_connection<S>(stream: S, client: ClientAddr, app: Router)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = hyper::service::service_fn(move |mut req: hyper::Request<Incoming>| {
        let mut app = app.clone();
        req.extensions_mut().insert(client);
        async move { app.call(req).await }
    });

    if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
    {
        // Ignore connection reset errors
        if !e.to_string().contains("connection reset") {
            error!("Connection error from {}: {}", client, e);
        } else {
            debug!("Connection reset by {}", client);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
