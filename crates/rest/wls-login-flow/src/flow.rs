//! The begin/callback/status state machine.

use thiserror::Error;
use tracing::{info, warn};
use wls_identity_core::{LocalAccount, SessionBridge, SessionError};
use wls_identity_oauth2::{CallbackParams, IdentityProviderError, OAuth2Client};
use wls_identity_reconcile::{IdentityReconciler, ReconciliationError};

/// Session keys used across the redirect round trip.
pub mod keys {
    /// Anti-forgery state token, single use.
    pub const STATE: &str = "oauth2.state";
    /// PKCE verifier matching the challenge sent with the redirect.
    pub const PKCE_VERIFIER: &str = "oauth2.pkce_verifier";
    /// Optional post-login destination captured at begin-login time.
    pub const RETURN_TO: &str = "oauth2.return_to";
    /// Marks the session as authenticated for the given account.
    pub const ACCOUNT_ID: &str = "oauth2.account_id";
}

#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// Callback state does not match the token issued at redirect time.
    /// Possible CSRF; the flow fails closed before any network call.
    #[error("authorization state mismatch")]
    StateMismatch,

    /// The provider reported an error on the callback (user denied,
    /// expired request) or sent no authorization code at all.
    #[error("identity provider denied the request: {0}")]
    ProviderDenied(String),

    #[error(transparent)]
    Provider(#[from] IdentityProviderError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("session failure: {0}")]
    Session(#[from] SessionError),
}

/// Result of a completed callback.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: LocalAccount,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    AlreadyLoggedIn,
    LoginPrompt,
}

/// Orchestrates the OAuth2 client, the session bridge and the reconciler.
///
/// Session access is an explicit argument on every entry point so hosts
/// and tests can supply their own [`SessionBridge`].
#[derive(Clone)]
pub struct LoginFlow {
    client: OAuth2Client,
    reconciler: IdentityReconciler,
    default_landing: String,
}

impl LoginFlow {
    pub fn new(
        client: OAuth2Client,
        reconciler: IdentityReconciler,
        default_landing: impl Into<String>,
    ) -> Self {
        Self {
            client,
            reconciler,
            default_landing: default_landing.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.client.config().service_name
    }

    /// Begin a login: persist the anti-forgery state (and return target)
    /// in the session, then hand back the provider authorization URL for
    /// the redirect.
    pub async fn begin_login(
        &self,
        session: &dyn SessionBridge,
        return_to: Option<&str>,
    ) -> Result<String, AuthFlowError> {
        let authorization = self.client.begin_authorization()?;

        session.persist().await?;
        session.set(keys::STATE, &authorization.state).await?;
        match &authorization.pkce_verifier {
            Some(verifier) => session.set(keys::PKCE_VERIFIER, verifier).await?,
            None => session.remove(keys::PKCE_VERIFIER).await?,
        }
        match return_to {
            Some(target) => session.set(keys::RETURN_TO, target).await?,
            None => session.remove(keys::RETURN_TO).await?,
        }
        session.save().await?;

        info!("Starting OAuth2 login against {}", self.service_name());
        Ok(authorization.url)
    }

    /// Handle the provider callback.
    ///
    /// The stored flow state is consumed up front, before any comparison
    /// or network call: a replayed or forged callback can never match
    /// twice, and the session is clean regardless of outcome.
    pub async fn handle_callback(
        &self,
        session: &dyn SessionBridge,
        params: CallbackParams,
    ) -> Result<LoginOutcome, AuthFlowError> {
        let stored_state = take(session, keys::STATE).await?;
        let pkce_verifier = take(session, keys::PKCE_VERIFIER).await?;
        let return_to = take(session, keys::RETURN_TO).await?;
        session.save().await?;

        match (&stored_state, &params.state) {
            (Some(stored), Some(inbound)) if stored == inbound => {}
            _ => {
                warn!("Callback state mismatch, aborting before token exchange");
                return Err(AuthFlowError::StateMismatch);
            }
        }

        if let Some(error) = &params.error {
            let description = params
                .error_description
                .as_deref()
                .unwrap_or("no description");
            return Err(AuthFlowError::ProviderDenied(format!(
                "{error}: {description}"
            )));
        }

        let code = params.code.as_deref().ok_or_else(|| {
            AuthFlowError::ProviderDenied("callback carried no authorization code".to_string())
        })?;

        let token = self
            .client
            .exchange_code(code, pkce_verifier.as_deref())
            .await?;
        let claims = self.client.fetch_resource_owner(&token).await?;
        let account = self.reconciler.reconcile(&claims).await?;

        session.persist().await?;
        session
            .set(keys::ACCOUNT_ID, &account.id.to_string())
            .await?;
        session.save().await?;

        let redirect_to = resolve_return_target(return_to.as_deref(), &self.default_landing);
        info!("Completed OAuth2 login for {}", account.email);

        Ok(LoginOutcome {
            account,
            redirect_to,
        })
    }

    /// Status-display short circuit: no provider involved.
    pub async fn status(&self, session: &dyn SessionBridge) -> Result<LoginStatus, AuthFlowError> {
        let status = if session.get(keys::ACCOUNT_ID).await?.is_some() {
            LoginStatus::AlreadyLoggedIn
        } else {
            LoginStatus::LoginPrompt
        };
        Ok(status)
    }
}

async fn take(
    session: &dyn SessionBridge,
    key: &str,
) -> Result<Option<String>, SessionError> {
    let value = session.get(key).await?;
    if value.is_some() {
        session.remove(key).await?;
    }
    Ok(value)
}

/// Accept only local absolute paths as post-login destinations, so the
/// redirect can never point at a foreign origin.
fn resolve_return_target(candidate: Option<&str>, default_landing: &str) -> String {
    match candidate {
        Some(target) if is_local_path(target) => target.to_string(),
        Some(target) => {
            warn!("Discarding non-local return target {:?}", target);
            default_landing.to_string()
        }
        None => default_landing.to_string(),
    }
}

fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}
