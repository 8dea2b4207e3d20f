//! `AuthGateway`: session minting, the OAuth routes, and the loopback
//! listener that serves them.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use rolebridge_dispatch::{DispatchError, WorkerPool};
use rolebridge_identity::IdentityStore;
use rolebridge_oauth::{CodeExchanger, OAuthEndpoints};
use rolebridge_protocol::{AuthResult, LocalUserId, RemoteAccountId};
use rolebridge_session::SessionCache;
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::handler::router;
use crate::{BridgeConfig, GatewayError};

/// Capacity of the auth result broadcast. A subscriber that falls further
/// behind than this sees `Lagged` and skips ahead.
const RESULT_CHANNEL_SIZE: usize = 64;

/// Shared state behind every route.
///
/// Wrapped in `Arc` so it can be cheaply cloned across request tasks.
/// The session cache sits behind one async `Mutex`, so a token lookup and
/// its removal are a single critical section.
pub(crate) struct GatewayState<X> {
    pub(crate) sessions: Mutex<SessionCache>,
    exchanger: X,
    identity: Arc<IdentityStore>,
    workers: WorkerPool,
    pub(crate) results: broadcast::Sender<AuthResult>,
    pub(crate) endpoints: OAuthEndpoints,
    pub(crate) client_id: String,
    pub(crate) callback_url: String,
    login_base: String,
}

impl<X> GatewayState<X> {
    /// Writes the link on a blocking thread. A failed flush is logged; the
    /// in-memory link is in place either way.
    async fn persist_link(&self, local_user: LocalUserId, account: RemoteAccountId) {
        let identity = Arc::clone(&self.identity);
        match tokio::task::spawn_blocking(move || identity.set_link(account, local_user)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(%local_user, error = %e, "identity link not persisted"),
            Err(e) => tracing::error!(%local_user, error = %e, "identity write task failed"),
        }
    }

    fn emit(&self, result: AuthResult) {
        let local_user = result.local_user();
        let success = result.is_success();
        if self.results.send(result).is_err() {
            tracing::debug!(%local_user, "no auth result subscribers");
        }
        tracing::info!(%local_user, success, "link attempt finished");
    }
}

impl<X: CodeExchanger> GatewayState<X> {
    /// Finishes a callback whose token is already spent: exchange the code
    /// on the worker pool, persist the link, emit exactly one result.
    ///
    /// Callers spawn this rather than awaiting it inline, so it runs to the
    /// end even if the request that started it is dropped.
    pub(crate) async fn complete_link(
        self: Arc<Self>,
        local_user: LocalUserId,
        code: String,
    ) -> Result<(), GatewayError> {
        let state = Arc::clone(&self);
        let exchange = self
            .workers
            .run_async(async move { state.exchanger.exchange(&code, &state.callback_url).await });

        let outcome = match exchange.await {
            Ok(Ok(result)) => result.map_err(GatewayError::from),
            Ok(Err(e)) => Err(GatewayError::from(e)),
            Err(e) => Err(DispatchError::WorkerPanicked(e.to_string()).into()),
        };

        match outcome {
            Ok(account) => {
                self.persist_link(local_user, account.clone()).await;
                self.emit(AuthResult::Success {
                    local_user,
                    account,
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%local_user, error = %e, "code exchange failed");
                self.emit(AuthResult::Failure {
                    local_user,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// The OAuth callback gateway.
///
/// Cheap to clone; clones share one session cache and one result channel.
/// Building one does not bind anything: [`router`](Self::router) gives the
/// routes for in-process use, [`serve`](Self::serve) puts them on a
/// loopback port.
pub struct AuthGateway<X> {
    state: Arc<GatewayState<X>>,
}

impl<X> Clone for AuthGateway<X> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<X: CodeExchanger> AuthGateway<X> {
    /// Builds a gateway from `config`. Code exchanges run on `workers`.
    ///
    /// # Errors
    /// [`GatewayError::ConfigurationIncomplete`] naming the first blank
    /// credential. Callers treat this as "linking disabled", not as fatal.
    pub fn new(
        config: &BridgeConfig,
        exchanger: X,
        identity: Arc<IdentityStore>,
        workers: WorkerPool,
    ) -> Result<Self, GatewayError> {
        if let Some(field) = config.missing_auth_field() {
            return Err(GatewayError::ConfigurationIncomplete(field));
        }
        let (results, _) = broadcast::channel(RESULT_CHANNEL_SIZE);
        Ok(Self {
            state: Arc::new(GatewayState {
                sessions: Mutex::new(SessionCache::new(config.session.clone())),
                exchanger,
                identity,
                workers,
                results,
                endpoints: config.oauth.clone(),
                client_id: config.client_id.clone(),
                callback_url: config.callback_url(),
                login_base: config.login_url(""),
            }),
        })
    }

    /// The routes, ready to be served or driven with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Mints a fresh token for `local_user` and returns the link to hand
    /// them. Every call yields a new token.
    pub async fn sign_up_url(&self, local_user: LocalUserId) -> String {
        let token = self.state.sessions.lock().await.mint(local_user);
        tracing::info!(%local_user, "sign-up url issued");
        format!("{}{token}", self.state.login_base)
    }

    /// Receives every [`AuthResult`] emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthResult> {
        self.state.results.subscribe()
    }

    /// Drops expired sessions; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.state.sessions.lock().await.purge_expired()
    }

    /// Number of sessions currently held, expired ones included.
    pub async fn pending_sessions(&self) -> usize {
        self.state.sessions.lock().await.len()
    }

    /// Binds `127.0.0.1:port` and starts serving. Port 0 picks a free port.
    ///
    /// # Errors
    /// [`GatewayError::Bind`] if the port can't be bound.
    pub async fn serve(&self, port: u16) -> Result<GatewayServer, GatewayError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GatewayError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "auth gateway stopped with error");
            }
        });

        tracing::info!(addr = %local_addr, "auth gateway listening");
        Ok(GatewayServer {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// A running gateway listener.
///
/// Stopping lets in-flight requests finish; session state lives in the
/// [`AuthGateway`] and is unaffected.
#[derive(Debug)]
pub struct GatewayServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl GatewayServer {
    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for open ones to drain.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::error!(error = %e, "auth gateway task panicked");
        }
        tracing::info!(addr = %self.local_addr, "auth gateway stopped");
    }
}
