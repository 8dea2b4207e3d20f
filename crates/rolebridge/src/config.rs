//! Top-level configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rolebridge_oauth::OAuthEndpoints;
use rolebridge_protocol::GovernedRoles;
use rolebridge_session::SessionConfig;
use rolebridge_sync::SyncSchedule;
use serde::Deserialize;

/// Everything [`RoleBridge`](crate::RoleBridge) needs to start.
///
/// Every field has a default, so a host can deserialize a partial document
/// (or nothing at all) and fill in only the OAuth credentials:
///
/// ```
/// # use rolebridge::BridgeConfig;
/// let config: BridgeConfig = serde_json::from_str(r#"{
///     "client_id": "1234",
///     "client_secret": "s3cret",
///     "governed_roles": ["patron", "vip"]
/// }"#).unwrap();
/// assert_eq!(config.port, 8080);
/// assert!(config.is_auth_complete());
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// OAuth application id on the remote platform.
    pub client_id: String,
    pub client_secret: String,
    /// Public base URL of the gateway, as the player's browser sees it.
    /// `/login` and `/callback` are appended to this.
    pub redirect_base_url: String,
    /// Loopback port the gateway listens on.
    pub port: u16,
    pub governed_roles: GovernedRoles,
    /// Prefix for the permission node that grants a governed role.
    pub permission_prefix: String,
    /// Where identity links are persisted.
    pub identity_file: PathBuf,
    pub session: SessionConfig,
    pub sync: SyncSchedule,
    pub oauth: OAuthEndpoints,
    /// Connect and request timeout for outbound OAuth calls.
    pub http_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_base_url: "http://localhost:8080".to_string(),
            port: 8080,
            governed_roles: GovernedRoles::new(["patron"]),
            permission_prefix: "rolebridge.role.".to_string(),
            identity_file: PathBuf::from("rolebridge/links.json"),
            session: SessionConfig::default(),
            sync: SyncSchedule::default(),
            oauth: OAuthEndpoints::default(),
            http_timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    /// Clamp and normalize values so the config is safe to use.
    ///
    /// - `redirect_base_url` loses any trailing `/`
    /// - `http_timeout_secs` is at least 1
    /// - the sync schedule is validated
    pub fn validated(mut self) -> Self {
        self.redirect_base_url = self.redirect_base_url.trim().trim_end_matches('/').to_string();
        if self.http_timeout_secs == 0 {
            tracing::warn!("http_timeout_secs of 0 is invalid, using 1");
            self.http_timeout_secs = 1;
        }
        self.sync = self.sync.validated();
        self
    }

    /// The first required auth setting that is blank, if any.
    pub fn missing_auth_field(&self) -> Option<&'static str> {
        [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_base_url", &self.redirect_base_url),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// `true` if the gateway has what it needs to start.
    pub fn is_auth_complete(&self) -> bool {
        self.missing_auth_field().is_none()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The `redirect_uri` registered with the remote platform.
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.redirect_base_url)
    }

    /// The link handed to a player to start linking.
    pub fn login_url(&self, token: &str) -> String {
        format!("{}/login?id={token}", self.redirect_base_url)
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_base_url", &self.redirect_base_url)
            .field("port", &self.port)
            .field("governed_roles", &self.governed_roles)
            .field("permission_prefix", &self.permission_prefix)
            .field("identity_file", &self.identity_file)
            .field("session", &self.session)
            .field("sync", &self.sync)
            .field("oauth", &self.oauth)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}
