//! Remote OAuth endpoint configuration and URL building.

use reqwest::Url;
use serde::Deserialize;

use crate::OAuthError;

const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
const DEFAULT_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const DEFAULT_PROFILE_URL: &str = "https://discord.com/api/users/@me";

/// The three remote URLs the flow touches.
///
/// Defaults point at Discord. Tests override all three to a loopback fake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            profile_url: DEFAULT_PROFILE_URL.to_string(),
        }
    }
}

impl OAuthEndpoints {
    /// All three endpoints under one base, as `<base>/oauth2/authorize`,
    /// `<base>/oauth2/token` and `<base>/users/@me`.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/oauth2/authorize"),
            token_url: format!("{base}/oauth2/token"),
            profile_url: format!("{base}/users/@me"),
        }
    }

    /// Where `/login` sends the player's browser.
    ///
    /// `state` is the session token; the remote hands it back unchanged on
    /// the callback.
    pub fn authorize_url(
        &self,
        client_id: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<Url, OAuthError> {
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("scope", "identify"),
                ("state", state),
                ("redirect_uri", redirect_uri),
            ],
        )
        .map_err(|_| OAuthError::InvalidUrl {
            endpoint: "authorize",
            url: self.authorize_url.clone(),
        })
    }

    /// The link a server admin follows to add the bot to their guild.
    pub fn bot_invite_url(&self, client_id: &str) -> Result<Url, OAuthError> {
        Url::parse_with_params(
            &self.authorize_url,
            &[("client_id", client_id), ("scope", "bot")],
        )
        .map_err(|_| OAuthError::InvalidUrl {
            endpoint: "authorize",
            url: self.authorize_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorize_url_carries_all_params() {
        let url = OAuthEndpoints::default()
            .authorize_url("123", "tok", "http://localhost:8080/callback")
            .unwrap();

        assert_eq!(url.host_str(), Some("discord.com"));
        assert_eq!(url.path(), "/api/oauth2/authorize");
        assert_eq!(
            query(&url),
            vec![
                ("response_type".into(), "code".into()),
                ("client_id".into(), "123".into()),
                ("scope".into(), "identify".into()),
                ("state".into(), "tok".into()),
                ("redirect_uri".into(), "http://localhost:8080/callback".into()),
            ]
        );
    }

    #[test]
    fn test_authorize_url_escapes_redirect() {
        let url = OAuthEndpoints::default()
            .authorize_url("123", "tok", "http://host/callback?x=1&y=2")
            .unwrap();
        assert!(url.as_str().contains("redirect_uri=http%3A%2F%2Fhost%2Fcallback%3Fx%3D1%26y%3D2"));
    }

    #[test]
    fn test_bot_invite_url_uses_bot_scope() {
        let url = OAuthEndpoints::default().bot_invite_url("123").unwrap();
        assert_eq!(
            query(&url),
            vec![
                ("client_id".into(), "123".into()),
                ("scope".into(), "bot".into()),
            ]
        );
    }

    #[test]
    fn test_invalid_authorize_url_is_reported() {
        let endpoints = OAuthEndpoints {
            authorize_url: "not a url".into(),
            ..OAuthEndpoints::default()
        };
        assert!(matches!(
            endpoints.bot_invite_url("123"),
            Err(OAuthError::InvalidUrl { endpoint: "authorize", .. })
        ));
    }

    #[test]
    fn test_with_base_trims_trailing_slash() {
        let e = OAuthEndpoints::with_base("http://127.0.0.1:9000/");
        assert_eq!(e.token_url, "http://127.0.0.1:9000/oauth2/token");
        assert_eq!(e.profile_url, "http://127.0.0.1:9000/users/@me");
    }
}
