//! End-to-end tests for `RoleBridge`: a real loopback gateway, the real
//! OAuth client talking to a fake remote, a temp-dir identity file, and
//! in-memory grants and role directory.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::TcpListener as StdListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Form;
use axum::routing::{get, post};
use axum::{Json, Router};
use rolebridge::prelude::*;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

// =========================================================================
// Collaborators
// =========================================================================

#[derive(Debug, Default)]
struct Grants {
    held: HashSet<(LocalUserId, String)>,
}

impl GrantTable for Grants {
    fn has_grant(&self, user: LocalUserId, node: &str) -> bool {
        self.held.contains(&(user, node.to_string()))
    }

    fn set_grant(&mut self, user: LocalUserId, node: &str, granted: bool) {
        if granted {
            self.held.insert((user, node.to_string()));
        } else {
            self.held.remove(&(user, node.to_string()));
        }
    }
}

#[derive(Debug, Default)]
struct Directory {
    roles: Mutex<HashMap<RemoteAccountId, BTreeSet<String>>>,
}

impl Directory {
    fn roles_of(&self, account: &str) -> BTreeSet<String> {
        self.roles
            .lock()
            .unwrap()
            .get(&RemoteAccountId::from(account))
            .cloned()
            .unwrap_or_default()
    }
}

impl RoleDirectory for Directory {
    async fn get_roles(&self, account: &RemoteAccountId) -> Result<BTreeSet<String>, SyncError> {
        self.roles
            .lock()
            .unwrap()
            .get(account)
            .cloned()
            .ok_or_else(|| SyncError::RemoteLookupMiss(account.clone()))
    }

    async fn set_roles(
        &self,
        account: &RemoteAccountId,
        roles: BTreeSet<String>,
    ) -> Result<(), SyncError> {
        self.roles.lock().unwrap().insert(account.clone(), roles);
        Ok(())
    }
}

// =========================================================================
// Fake remote platform
// =========================================================================

async fn token(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    match form.get("code").map(String::as_str) {
        Some("good") => Json(json!({"access_token": "abc"})),
        _ => Json(json!({"error": "invalid_grant"})),
    }
}

async fn profile() -> Json<Value> {
    Json(json!({"id": "42", "username": "nelly"}))
}

async fn start_fake_remote() -> String {
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/users/@me", get(profile));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// =========================================================================
// Helpers
// =========================================================================

fn config(remote: &str, dir: &Path) -> BridgeConfig {
    BridgeConfig {
        client_id: "1234".into(),
        client_secret: "s3cret".into(),
        port: 0,
        governed_roles: GovernedRoles::new(["patron", "vip"]),
        identity_file: dir.join("links.json"),
        oauth: OAuthEndpoints::with_base(remote),
        http_timeout_secs: 5,
        ..BridgeConfig::default()
    }
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Polls `check` until it holds or two seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =========================================================================
// Linking
// =========================================================================

#[tokio::test]
async fn test_full_link_flow_persists_and_syncs_immediately() {
    let remote = start_fake_remote().await;
    let dir = tempfile::tempdir().unwrap();
    let user = LocalUserId::new_random();

    let mut grants = Grants::default();
    grants.held.insert((user, permission_node("rolebridge.role.", "patron")));
    let dispatcher = TaskDispatcher::start(grants, DispatchConfig::default());
    let directory = Arc::new(Directory::default());
    directory
        .roles
        .lock()
        .unwrap()
        .insert("42".into(), ["vip", "admin"].iter().map(|r| r.to_string()).collect());

    let bridge = RoleBridge::start(config(&remote, dir.path()), dispatcher, Arc::clone(&directory))
        .await
        .unwrap();
    assert!(bridge.auth_enabled());
    let mut results = bridge.subscribe_auth_results().unwrap();
    let addr = bridge.gateway_addr().unwrap();

    let sign_up = bridge.sign_up_url(user).await.unwrap();
    let token = sign_up.split("id=").nth(1).unwrap();

    let login = http()
        .get(format!("http://{addr}/login?id={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), reqwest::StatusCode::FOUND);

    let callback = http()
        .get(format!("http://{addr}/callback?state={token}&code=good"))
        .send()
        .await
        .unwrap();
    assert_eq!(callback.text().await.unwrap(), "<h1>Great success!</h1>");

    assert_eq!(
        results.recv().await.unwrap(),
        AuthResult::Success {
            local_user: user,
            account: "42".into(),
        }
    );
    assert_eq!(bridge.remote_id_of(user), Some("42".into()));
    assert_eq!(bridge.local_id_of(&"42".into()), Some(user));

    let expected: BTreeSet<String> = ["admin", "patron"].iter().map(|r| r.to_string()).collect();
    eventually(|| directory.roles_of("42") == expected).await;

    bridge.shutdown().await;

    let reopened = IdentityStore::open(dir.path().join("links.json"));
    assert_eq!(reopened.get_local_id(&"42".into()), Some(user));
}

#[tokio::test]
async fn test_failed_exchange_reports_failure_and_links_nothing() {
    let remote = start_fake_remote().await;
    let dir = tempfile::tempdir().unwrap();
    let user = LocalUserId::new_random();
    let dispatcher = TaskDispatcher::start(Grants::default(), DispatchConfig::default());

    let bridge = RoleBridge::start(config(&remote, dir.path()), dispatcher, Directory::default())
        .await
        .unwrap();
    let mut results = bridge.subscribe_auth_results().unwrap();
    let addr = bridge.gateway_addr().unwrap();
    let sign_up = bridge.sign_up_url(user).await.unwrap();
    let token = sign_up.split("id=").nth(1).unwrap();

    let body = http()
        .get(format!("http://{addr}/callback?state={token}&code=expired"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "token response has no access_token");
    assert!(matches!(
        results.recv().await.unwrap(),
        AuthResult::Failure { local_user, .. } if local_user == user
    ));
    assert_eq!(bridge.remote_id_of(user), None);
    bridge.shutdown().await;
}

/// Resolves every code to account `"42"`, slowly.
struct SlowExchanger;

impl CodeExchanger for SlowExchanger {
    async fn exchange(&self, _code: &str, _redirect_uri: &str) -> Result<RemoteAccountId, OAuthError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok("42".into())
    }
}

#[tokio::test]
async fn test_callback_completes_after_client_disconnects() {
    let identity = Arc::new(IdentityStore::in_memory());
    let config = BridgeConfig {
        client_id: "1234".into(),
        client_secret: "s3cret".into(),
        ..BridgeConfig::default()
    };
    let gateway =
        AuthGateway::new(&config, SlowExchanger, Arc::clone(&identity), WorkerPool::new(2)).unwrap();
    let mut results = gateway.subscribe();
    let server = gateway.serve(0).await.unwrap();
    let user = LocalUserId::new_random();
    let sign_up = gateway.sign_up_url(user).await;
    let token = sign_up.split("id=").nth(1).unwrap();

    let mut stream = tokio::net::TcpStream::connect(server.local_addr()).await.unwrap();
    let request = format!("GET /callback?state={token}&code=C HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(stream);

    let result = tokio::time::timeout(Duration::from_secs(2), results.recv())
        .await
        .expect("result should still be emitted")
        .unwrap();
    assert_eq!(
        result,
        AuthResult::Success {
            local_user: user,
            account: "42".into(),
        }
    );
    assert_eq!(identity.get_local_id(&"42".into()), Some(user));
    assert_eq!(gateway.pending_sessions().await, 0);
    server.stop().await;
}

// =========================================================================
// Degraded startup
// =========================================================================

#[tokio::test]
async fn test_incomplete_config_disables_linking_but_not_sync() {
    let dir = tempfile::tempdir().unwrap();
    let user = LocalUserId::new_random();
    let mut grants = Grants::default();
    grants.held.insert((user, permission_node("rolebridge.role.", "patron")));
    let dispatcher = TaskDispatcher::start(grants, DispatchConfig::default());
    let directory = Arc::new(Directory::default());
    directory.roles.lock().unwrap().insert("42".into(), BTreeSet::new());

    IdentityStore::open(dir.path().join("links.json"))
        .set_link("42".into(), user)
        .unwrap();

    let config = BridgeConfig {
        client_secret: String::new(),
        ..config("http://127.0.0.1:9", dir.path())
    };
    let bridge = RoleBridge::start(config, dispatcher, Arc::clone(&directory))
        .await
        .unwrap();

    assert!(!bridge.auth_enabled());
    assert!(bridge.subscribe_auth_results().is_none());
    assert!(matches!(
        bridge.sign_up_url(user).await,
        Err(BridgeError::Gateway(GatewayError::NotRunning))
    ));

    let report = bridge.sync_now().await.unwrap();
    assert_eq!(report.updated, 1);
    assert!(directory.roles_of("42").contains("patron"));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_port_in_use_disables_linking() {
    let taken = StdListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = TaskDispatcher::start(Grants::default(), DispatchConfig::default());

    let bridge = RoleBridge::start(
        BridgeConfig {
            port,
            ..config("http://127.0.0.1:9", dir.path())
        },
        dispatcher,
        Directory::default(),
    )
    .await
    .unwrap();

    assert!(!bridge.auth_enabled());
    assert_eq!(bridge.gateway_addr(), None);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_bot_invite_url_uses_client_id() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = TaskDispatcher::start(Grants::default(), DispatchConfig::default());
    let bridge = RoleBridge::start(
        config("http://127.0.0.1:9", dir.path()),
        dispatcher,
        Directory::default(),
    )
    .await
    .unwrap();

    let url = bridge.bot_invite_url().unwrap();

    assert_eq!(url, "http://127.0.0.1:9/oauth2/authorize?client_id=1234&scope=bot");
    bridge.shutdown().await;
}

// =========================================================================
// Remote role events
// =========================================================================

#[tokio::test]
async fn test_relayed_role_event_updates_grants() {
    let dir = tempfile::tempdir().unwrap();
    let user = LocalUserId::new_random();
    let dispatcher = TaskDispatcher::start(Grants::default(), DispatchConfig::default());
    IdentityStore::open(dir.path().join("links.json"))
        .set_link("42".into(), user)
        .unwrap();

    let mut bridge = RoleBridge::start(
        config("http://127.0.0.1:9", dir.path()),
        dispatcher.clone(),
        Directory::default(),
    )
    .await
    .unwrap();
    let (tx, rx) = mpsc::channel(8);
    bridge.relay_role_events(rx);

    tx.send(RemoteRoleEvent::added("42", "VIP")).await.unwrap();

    let node = permission_node("rolebridge.role.", "vip");
    let mut granted = false;
    for _ in 0..200 {
        let node = node.clone();
        granted = dispatcher
            .call_sync(move |g: &mut Grants| g.has_grant(user, &node))
            .await
            .unwrap();
        if granted {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(granted);
    bridge.shutdown().await;
}
