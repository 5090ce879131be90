//! Provider-facing error types.

use thiserror::Error;
use wls_identity_core::ClaimsError;

pub type OAuth2Result<T> = Result<T, IdentityProviderError>;

/// Failure talking to the identity provider. Terminal for the triggering
/// request; surfaced to the user, never retried.
#[derive(Debug, Error)]
pub enum IdentityProviderError {
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("resource owner request failed: {0}")]
    ResourceOwner(String),

    #[error("request to identity provider timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid claims payload: {0}")]
    Claims(#[from] ClaimsError),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for IdentityProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}
