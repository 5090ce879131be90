//! Axum surface: one mount point, dispatched on a single path parameter.

use crate::flow::{AuthFlowError, LoginFlow, LoginStatus};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use wls_identity_core::SessionBridge;
use wls_identity_oauth2::CallbackParams;

/// The path parameter the entry point dispatches on. Anything that is not
/// `redirect` or `callback` shows the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    Redirect,
    Callback,
    Status,
}

impl LoginAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "redirect" => Self::Redirect,
            "callback" => Self::Callback,
            _ => Self::Status,
        }
    }
}

/// Union of the query parameters the three actions understand.
#[derive(Debug, Default, Deserialize)]
struct DispatchQuery {
    returnto: Option<String>,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Clone)]
struct AppState {
    flow: Arc<LoginFlow>,
    mount_path: String,
}

/// Build the login router.
///
/// `mount_path` is where the host mounts it (used to build the login link
/// on the status page). The host must install a request-scoped
/// `Extension<Arc<dyn SessionBridge>>` via middleware; cookie and session
/// plumbing stay on the host side.
pub fn login_router(flow: LoginFlow, mount_path: impl Into<String>) -> Router {
    let state = AppState {
        flow: Arc::new(flow),
        mount_path: mount_path.into(),
    };

    Router::new()
        .route("/", get(status_page))
        .route("/{action}", get(dispatch))
        .with_state(state)
}

/// Plain `302 Found`, matching what the wiki issued historically.
fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

async fn dispatch(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Extension(session): Extension<Arc<dyn SessionBridge>>,
    Query(query): Query<DispatchQuery>,
) -> Result<Response, AuthFlowError> {
    match LoginAction::parse(&action) {
        LoginAction::Redirect => {
            let url = state
                .flow
                .begin_login(session.as_ref(), query.returnto.as_deref())
                .await?;
            Ok(found(&url))
        }
        LoginAction::Callback => {
            let params = CallbackParams {
                code: query.code,
                state: query.state,
                error: query.error,
                error_description: query.error_description,
            };
            let outcome = state.flow.handle_callback(session.as_ref(), params).await?;
            Ok(found(&outcome.redirect_to))
        }
        LoginAction::Status => render_status(&state, session.as_ref()).await,
    }
}

async fn status_page(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<dyn SessionBridge>>,
) -> Result<Response, AuthFlowError> {
    render_status(&state, session.as_ref()).await
}

async fn render_status(
    state: &AppState,
    session: &dyn SessionBridge,
) -> Result<Response, AuthFlowError> {
    let service = state.flow.service_name();
    let body = match state.flow.status(session).await? {
        LoginStatus::AlreadyLoggedIn => {
            format!("<h1>Login with {service}</h1><p>You are already logged in.</p>")
        }
        LoginStatus::LoginPrompt => {
            let login_url = format!("{}/redirect", state.mount_path.trim_end_matches('/'));
            format!(
                "<h1>Login with {service}</h1>\
                 <p>You can log in to this wiki with {service}.</p>\
                 <p><a href=\"{login_url}\">Log in with {service}</a></p>"
            )
        }
    };
    Ok(Html(body).into_response())
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        error!("Login flow error: {}", self);

        // State mismatch gets a deliberately generic body.
        let (status, message) = match &self {
            AuthFlowError::StateMismatch => {
                (StatusCode::FORBIDDEN, "Authentication failed".to_string())
            }
            AuthFlowError::ProviderDenied(_) | AuthFlowError::Provider(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AuthFlowError::Reconciliation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AuthFlowError::Session(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session failure".to_string(),
            ),
        };

        (status, message).into_response()
    }
}
