//! HTTP route handlers for the OAuth flow.
//!
//! ```text
//! GET /login?id=<token>              → 302 to the remote authorize page
//! GET /callback?state=<token>&code=… → exchange, persist, emit AuthResult
//! anything else                      → 403, empty body
//! ```
//!
//! Paths match case-insensitively (`/Login` works too). Request-level
//! failures answer `202 Accepted` with a plain-text reason; the player
//! reads it in their browser.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rolebridge_dispatch::DispatchError;
use rolebridge_oauth::CodeExchanger;
use serde::Deserialize;

use crate::GatewayError;
use crate::server::GatewayState;

/// Body served after a successful link.
pub(crate) const SUCCESS_PAGE: &str = "<h1>Great success!</h1>";

#[derive(Debug, Deserialize)]
pub(crate) struct LoginParams {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
}

/// Builds the gateway router over shared state.
pub(crate) fn router<X: CodeExchanger>(state: Arc<GatewayState<X>>) -> Router {
    Router::new()
        .route("/login", get(login::<X>))
        .route("/callback", get(callback::<X>))
        .fallback(case_folded::<X>)
        .with_state(state)
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn login<X: CodeExchanger>(
    State(gateway): State<Arc<GatewayState<X>>>,
    Query(params): Query<LoginParams>,
) -> Result<Response, GatewayError> {
    let token = present(params.id).ok_or(GatewayError::MissingId)?;
    let url = gateway.endpoints.authorize_url(
        &gateway.client_id,
        &token,
        &gateway.callback_url,
    )?;
    tracing::debug!("redirecting to remote authorize page");
    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}

async fn callback<X: CodeExchanger>(
    State(gateway): State<Arc<GatewayState<X>>>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<&'static str>, GatewayError> {
    let token = present(params.state).ok_or(GatewayError::MissingState)?;
    let code = present(params.code).ok_or(GatewayError::MissingCode)?;

    let local_user = gateway
        .sessions
        .lock()
        .await
        .take_and_invalidate(&token)
        .ok_or(GatewayError::SessionExpired)?;

    // Detached from the request: a client hanging up must not cut the
    // attempt short once the token is spent.
    let attempt = tokio::spawn(Arc::clone(&gateway).complete_link(local_user, code));
    match attempt.await {
        Ok(result) => result.map(|()| Html(SUCCESS_PAGE)),
        Err(e) => Err(DispatchError::WorkerPanicked(e.to_string()).into()),
    }
}

/// Serves `/LOGIN`, `/Callback` and friends; everything else is refused.
async fn case_folded<X: CodeExchanger>(
    State(gateway): State<Arc<GatewayState<X>>>,
    uri: Uri,
) -> Response {
    match uri.path().to_ascii_lowercase().as_str() {
        "/login" => match Query::try_from_uri(&uri) {
            Ok(params) => login(State(gateway), params).await.into_response(),
            Err(rejection) => rejection.into_response(),
        },
        "/callback" => match Query::try_from_uri(&uri) {
            Ok(params) => callback(State(gateway), params).await.into_response(),
            Err(rejection) => rejection.into_response(),
        },
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}
