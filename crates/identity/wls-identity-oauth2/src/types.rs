//! OAuth2 protocol types.

use serde::{Deserialize, Serialize};

/// Outcome of starting an authorization round trip. The caller must
/// persist `state` (and the PKCE verifier, when present) before issuing
/// the redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub pkce_verifier: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

/// Query parameters the provider sends back to the redirect URI. All
/// optional: an unhappy provider sends `error` instead of `code`, and a
/// forged request may carry anything at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}
