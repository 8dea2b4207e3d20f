//! `RoleBridge`: wires the gateway, identity store, and role sync together.

use std::net::SocketAddr;
use std::sync::Arc;

use rolebridge_dispatch::{DispatchError, TaskDispatcher, WorkerPool};
use rolebridge_identity::IdentityStore;
use rolebridge_oauth::{CodeExchanger, OAuthClient};
use rolebridge_protocol::{AuthResult, LocalUserId, RemoteAccountId, RemoteRoleEvent};
use rolebridge_sync::{
    CycleReport, GrantTable, Reconciler, RoleDirectory, RoleEventRelay, RoleSyncScheduler,
    SyncHandle,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{AuthGateway, BridgeConfig, BridgeError, GatewayError, GatewayServer};

type SharedReconciler<S, D> = Arc<Reconciler<TaskDispatcher<S>, D>>;

/// The running subsystem.
///
/// Built once at host startup with every collaborator passed in
/// explicitly: the dispatcher that owns the host's grant table and the
/// client for the remote role directory. Nothing here is ever fatal to the
/// host. If the OAuth credentials are missing or the port is taken,
/// linking is disabled and role sync keeps running for existing links.
///
/// ## Lifecycle
///
/// ```text
/// start(config, dispatcher, directory) ──→ sign_up_url / relay_role_events ... ──→ shutdown()
/// ```
pub struct RoleBridge<S, D, X = OAuthClient> {
    config: BridgeConfig,
    identity: Arc<IdentityStore>,
    dispatcher: TaskDispatcher<S>,
    reconciler: SharedReconciler<S, D>,
    gateway: Option<(AuthGateway<X>, GatewayServer)>,
    sync: SyncHandle,
    background: Vec<JoinHandle<()>>,
}

impl<S: GrantTable, D: RoleDirectory> RoleBridge<S, D, OAuthClient> {
    /// Starts everything with the real OAuth client.
    pub async fn start(
        config: BridgeConfig,
        dispatcher: TaskDispatcher<S>,
        directory: D,
    ) -> Result<Self, BridgeError> {
        let config = config.validated();
        let exchanger = match OAuthClient::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.oauth.clone(),
            config.http_timeout(),
        ) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "oauth client unavailable, linking disabled");
                None
            }
        };
        Self::start_with(config, dispatcher, directory, exchanger).await
    }
}

impl<S: GrantTable, D: RoleDirectory, X: CodeExchanger> RoleBridge<S, D, X> {
    /// Starts everything with a caller-supplied exchanger. `None` disables
    /// linking outright.
    ///
    /// # Errors
    /// Only if the worker pool is unavailable for loading the identity
    /// file. Gateway problems are logged and leave linking disabled.
    pub async fn start_with(
        config: BridgeConfig,
        dispatcher: TaskDispatcher<S>,
        directory: D,
        exchanger: Option<X>,
    ) -> Result<Self, BridgeError> {
        let config = config.validated();

        let path = config.identity_file.clone();
        let identity = dispatcher
            .run_blocking(move || IdentityStore::open(path))
            .await
            .map_err(|e| DispatchError::WorkerPanicked(e.to_string()))??;
        let identity = Arc::new(identity);

        let reconciler = Arc::new(Reconciler::new(
            config.governed_roles.clone(),
            config.permission_prefix.clone(),
            dispatcher.clone(),
            directory,
        ));

        let mut background = Vec::new();
        let gateway = match exchanger {
            Some(exchanger) => match start_gateway(
                &config,
                exchanger,
                Arc::clone(&identity),
                dispatcher.workers().clone(),
            )
            .await
            {
                Ok((gateway, server, results)) => {
                    background.push(spawn_link_listener(
                        results,
                        Arc::clone(&reconciler),
                        dispatcher.workers().clone(),
                    ));
                    background.push(spawn_session_sweeper(gateway.clone(), &config));
                    Some((gateway, server))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "auth gateway not started, linking disabled");
                    None
                }
            },
            None => None,
        };

        let sync = RoleSyncScheduler::spawn(
            Arc::clone(&reconciler),
            Arc::clone(&identity),
            dispatcher.workers().clone(),
            config.sync,
        );

        tracing::info!(
            linking = gateway.is_some(),
            links = identity.len(),
            governed = config.governed_roles.len(),
            "rolebridge started"
        );

        Ok(Self {
            config,
            identity,
            dispatcher,
            reconciler,
            gateway,
            sync,
            background,
        })
    }

    /// `true` if the gateway is up and players can link.
    pub fn auth_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Where the gateway is listening, if it is.
    pub fn gateway_addr(&self) -> Option<SocketAddr> {
        self.gateway.as_ref().map(|(_, server)| server.local_addr())
    }

    /// A fresh link for `local_user` to follow.
    ///
    /// # Errors
    /// [`GatewayError::NotRunning`] if linking is disabled.
    pub async fn sign_up_url(&self, local_user: LocalUserId) -> Result<String, BridgeError> {
        let (gateway, _) = self.gateway.as_ref().ok_or(GatewayError::NotRunning)?;
        Ok(gateway.sign_up_url(local_user).await)
    }

    /// The link an admin follows to add the bot to their guild.
    pub fn bot_invite_url(&self) -> Result<String, BridgeError> {
        let url = self.config.oauth.bot_invite_url(&self.config.client_id)?;
        Ok(url.to_string())
    }

    /// Receives every [`AuthResult`] emitted from now on, or `None` if
    /// linking is disabled.
    pub fn subscribe_auth_results(&self) -> Option<broadcast::Receiver<AuthResult>> {
        self.gateway.as_ref().map(|(gateway, _)| gateway.subscribe())
    }

    pub fn remote_id_of(&self, local_user: LocalUserId) -> Option<RemoteAccountId> {
        self.identity.get_remote_id(local_user)
    }

    pub fn local_id_of(&self, account: &RemoteAccountId) -> Option<LocalUserId> {
        self.identity.get_local_id(account)
    }

    /// Mirrors remote role changes from `events` into the grant table until
    /// the sender side closes.
    pub fn relay_role_events(&mut self, events: mpsc::Receiver<RemoteRoleEvent>) {
        let relay = RoleEventRelay::spawn(
            events,
            self.dispatcher.clone(),
            Arc::clone(&self.identity),
            self.config.governed_roles.clone(),
            self.config.permission_prefix.clone(),
        );
        self.background.push(relay);
    }

    /// Runs one reconciliation cycle now, outside the schedule, on the
    /// worker pool.
    ///
    /// # Errors
    /// [`DispatchError`] if the pool is closed or the cycle panicked.
    pub async fn sync_now(&self) -> Result<CycleReport, BridgeError> {
        let reconciler = Arc::clone(&self.reconciler);
        let links = self.identity.snapshot();
        let report = self
            .dispatcher
            .run_async(async move { reconciler.run_cycle(&links).await })
            .await
            .map_err(|e| DispatchError::WorkerPanicked(e.to_string()))??;
        Ok(report)
    }

    /// The last scheduled cycle's report.
    pub fn last_sync_report(&self) -> Option<CycleReport> {
        self.sync.last_report()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Stops the gateway and the scheduler, waiting for any cycle in
    /// progress to finish. The dispatcher belongs to the caller and keeps
    /// running.
    pub async fn shutdown(self) {
        if let Some((_, server)) = self.gateway {
            server.stop().await;
        }
        for task in &self.background {
            task.abort();
        }
        self.sync.stop().await;
        tracing::info!("rolebridge stopped");
    }
}

/// Builds and binds the gateway. The result receiver is subscribed before
/// the port opens so the link listener can't miss the first callback.
async fn start_gateway<X: CodeExchanger>(
    config: &BridgeConfig,
    exchanger: X,
    identity: Arc<IdentityStore>,
    workers: WorkerPool,
) -> Result<(AuthGateway<X>, GatewayServer, broadcast::Receiver<AuthResult>), GatewayError> {
    let gateway = AuthGateway::new(config, exchanger, identity, workers)?;
    let results = gateway.subscribe();
    let server = gateway.serve(config.port).await?;
    Ok((gateway, server, results))
}

/// Reconciles a user right after they link, instead of waiting up to a
/// full period for the next cycle. Each reconcile runs on the worker pool.
fn spawn_link_listener<S: GrantTable, D: RoleDirectory>(
    mut results: broadcast::Receiver<AuthResult>,
    reconciler: SharedReconciler<S, D>,
    workers: WorkerPool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match results.recv().await {
                Ok(AuthResult::Success {
                    local_user,
                    account,
                }) => {
                    let reconciler = Arc::clone(&reconciler);
                    let job = workers
                        .run_async(async move { reconciler.reconcile_user(local_user, &account).await });
                    match job.await {
                        Ok(Ok(Ok(outcome))) => {
                            tracing::debug!(%local_user, ?outcome, "linked user synced")
                        }
                        Ok(Ok(Err(e))) => {
                            tracing::warn!(%local_user, error = %e, "initial role sync failed")
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(%local_user, error = %e, "initial role sync not run")
                        }
                        Err(e) => {
                            tracing::error!(%local_user, error = %e, "initial role sync panicked")
                        }
                    }
                }
                Ok(AuthResult::Failure { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "link listener lagged; next cycle will catch up");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Sweeps abandoned sessions on the sync schedule.
fn spawn_session_sweeper<X: CodeExchanger>(
    gateway: AuthGateway<X>,
    config: &BridgeConfig,
) -> JoinHandle<()> {
    let schedule = config.sync;
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + schedule.warmup(), schedule.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = gateway.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "expired link sessions swept");
            }
        }
    })
}
