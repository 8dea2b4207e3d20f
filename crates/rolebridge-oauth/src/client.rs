//! The HTTP side of the authorization-code exchange.

use std::future::Future;
use std::time::Duration;

use rolebridge_protocol::{Codec, JsonCodec, RemoteAccountId, RemoteProfile, TokenResponse};

use crate::{OAuthEndpoints, OAuthError};

const USER_AGENT: &str = concat!("rolebridge/", env!("CARGO_PKG_VERSION"));

/// Turns an authorization code into a remote account id.
///
/// The seam between the gateway and the network. [`OAuthClient`] is the
/// real implementation; tests plug in anything that answers with a canned
/// id or error.
pub trait CodeExchanger: Send + Sync + 'static {
    /// Exchanges `code` (issued for `redirect_uri`) and resolves the
    /// account it belongs to.
    fn exchange(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> impl Future<Output = Result<RemoteAccountId, OAuthError>> + Send;
}

/// OAuth client for the remote chat platform.
///
/// Holds one pooled `reqwest::Client` with both a connect and an overall
/// request timeout, so a stalled remote fails the exchange instead of
/// pinning a worker. There are no retries: an authorization code is single
/// use, and a failed exchange is reported to the player who can simply try
/// again.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    endpoints: OAuthEndpoints,
    codec: JsonCodec,
}

impl OAuthClient {
    /// Builds a client.
    ///
    /// # Errors
    /// [`OAuthError::Client`] if the HTTP client can't be constructed.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        endpoints: OAuthEndpoints,
        timeout: Duration,
    ) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(OAuthError::Client)?;

        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoints,
            codec: JsonCodec,
        })
    }

    /// The endpoints this client talks to.
    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    /// `POST token_url` with the code; returns the access token.
    pub async fn request_token(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        const ENDPOINT: &str = "token";

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|source| OAuthError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let body = read_success_body(ENDPOINT, response).await?;
        let token: TokenResponse = self
            .codec
            .decode(&body)
            .map_err(|e| OAuthError::from_protocol(ENDPOINT, e))?;
        if let Some(err) = &token.error {
            tracing::debug!(error = %err, "token endpoint reported an error");
        }
        token
            .into_access_token()
            .map_err(|e| OAuthError::from_protocol(ENDPOINT, e))
    }

    /// `GET profile_url` with the bearer token; returns the account id.
    pub async fn fetch_account(&self, access_token: &str) -> Result<RemoteAccountId, OAuthError> {
        const ENDPOINT: &str = "profile";

        let response = self
            .http
            .get(&self.endpoints.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|source| OAuthError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let body = read_success_body(ENDPOINT, response).await?;
        let profile: RemoteProfile = self
            .codec
            .decode(&body)
            .map_err(|e| OAuthError::from_protocol(ENDPOINT, e))?;
        profile
            .into_account_id()
            .map_err(|e| OAuthError::from_protocol(ENDPOINT, e))
    }
}

impl CodeExchanger for OAuthClient {
    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<RemoteAccountId, OAuthError> {
        let token = self.request_token(code, redirect_uri).await?;
        let account = self.fetch_account(&token).await?;
        tracing::debug!(%account, "authorization code exchanged");
        Ok(account)
    }
}

async fn read_success_body(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<Vec<u8>, OAuthError> {
    let status = response.status();
    if !status.is_success() {
        // Best effort: the status alone is enough if the body is unreadable.
        let body = response.text().await.unwrap_or_default();
        return Err(OAuthError::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|source| OAuthError::Transport { endpoint, source })?;
    Ok(bytes.to_vec())
}
