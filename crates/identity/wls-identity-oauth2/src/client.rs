//! Authorization-code flow client.

use crate::config::{ProviderConfig, TokenDelivery};
use crate::error::{IdentityProviderError, OAuth2Result};
use crate::types::{AuthorizationRequest, TokenResponse};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, thread_rng};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;
use wls_identity_core::Claims;

/// PKCE code challenge and verifier (S256).
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceChallenge {
    pub fn new() -> Self {
        let code_verifier = random_token(64);
        let code_challenge = Self::generate_code_challenge(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: "S256".to_string(),
        }
    }

    fn generate_code_challenge(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let result = hasher.finalize();
        URL_SAFE_NO_PAD.encode(result)
    }
}

/// Random URL-safe token from `len` bytes of RNG output. Used for the
/// anti-forgery state and the PKCE verifier.
fn random_token(len: usize) -> String {
    let mut rng = thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.r#gen::<u8>()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Client for one identity provider's authorization-code flow.
///
/// Holds no per-login state: the state token and PKCE verifier returned by
/// [`OAuth2Client::begin_authorization`] live in the caller's session
/// until the provider calls back.
#[derive(Clone)]
pub struct OAuth2Client {
    config: Arc<ProviderConfig>,
    http_client: Client,
}

impl OAuth2Client {
    /// Both outbound calls (token exchange, resource-owner fetch) are
    /// bounded by `http_timeout`; expiry surfaces as
    /// [`IdentityProviderError::Timeout`].
    pub fn new(config: Arc<ProviderConfig>, http_timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the provider authorization URL with a fresh state token.
    ///
    /// No side effects beyond randomness; the caller persists the state.
    pub fn begin_authorization(&self) -> OAuth2Result<AuthorizationRequest> {
        let mut url = Url::parse(&self.config.authorize_url)?;

        let state = random_token(32);
        let pkce = self.config.use_pkce.then(PkceChallenge::new);

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", &self.config.redirect_uri);
            params.append_pair("state", &state);

            if !self.config.scopes.is_empty() {
                params.append_pair("scope", &self.config.scopes.join(" "));
            }

            if let Some(pkce) = &pkce {
                params.append_pair("code_challenge", &pkce.code_challenge);
                params.append_pair("code_challenge_method", &pkce.code_challenge_method);
            }
        }

        debug!(
            "Generated authorization URL for {}",
            self.config.service_name
        );

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            pkce_verifier: pkce.map(|p| p.code_verifier),
        })
    }

    /// Authorization-code grant against the token endpoint.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> OAuth2Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("client_secret", self.config.client_secret.as_str());
        params.insert("redirect_uri", self.config.redirect_uri.as_str());

        if let Some(verifier) = pkce_verifier {
            params.insert("code_verifier", verifier);
        }

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {}", error_text);
            return Err(IdentityProviderError::TokenExchange(error_text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityProviderError::InvalidResponse(e.to_string()))?;

        info!("Exchanged authorization code for access token");
        Ok(token_response)
    }

    /// Fetch and normalize the resource-owner claims.
    pub async fn fetch_resource_owner(&self, token: &TokenResponse) -> OAuth2Result<Claims> {
        let request = match &self.config.token_delivery {
            TokenDelivery::BearerHeader => self
                .http_client
                .get(&self.config.resource_owner_url)
                .bearer_auth(&token.access_token),
            TokenDelivery::QueryParameter(name) => self
                .http_client
                .get(&self.config.resource_owner_url)
                .query(&[(name.as_str(), token.access_token.as_str())]),
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Resource owner request failed: {}", error_text);
            return Err(IdentityProviderError::ResourceOwner(error_text));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IdentityProviderError::InvalidResponse(e.to_string()))?;

        let claims = Claims::from_value(payload)?;
        debug!("Fetched resource owner claims");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wls_identity_core::{ClaimFieldMap, GroupRules};

    fn test_config(use_pkce: bool) -> Arc<ProviderConfig> {
        Arc::new(ProviderConfig {
            service_name: "Test SSO".to_string(),
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
            redirect_uri: "http://localhost:3000/login/callback".to_string(),
            authorize_url: "https://example.com/auth".to_string(),
            token_url: "https://example.com/token".to_string(),
            resource_owner_url: "https://example.com/userinfo".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            token_delivery: TokenDelivery::default(),
            use_pkce,
            claim_fields: ClaimFieldMap::default(),
            group_rules: GroupRules::default(),
        })
    }

    #[test]
    fn pkce_challenge_is_fresh_and_s256() {
        let pkce1 = PkceChallenge::new();
        let pkce2 = PkceChallenge::new();

        assert_ne!(pkce1.code_verifier, pkce2.code_verifier);
        assert_ne!(pkce1.code_challenge, pkce2.code_challenge);
        assert_eq!(pkce1.code_challenge_method, "S256");

        let expected = PkceChallenge::generate_code_challenge(&pkce1.code_verifier);
        assert_eq!(pkce1.code_challenge, expected);
    }

    #[test]
    fn authorization_url_carries_flow_parameters() {
        let client = OAuth2Client::new(test_config(false), Duration::from_secs(5));
        let request = client.begin_authorization().unwrap();

        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/auth");

        let params: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("response_type"), Some(&"code".into()));
        assert_eq!(params.get("client_id"), Some(&"test_client_id".into()));
        assert_eq!(
            params.get("redirect_uri"),
            Some(&"http://localhost:3000/login/callback".into())
        );
        assert_eq!(params.get("state"), Some(&request.state.clone().into()));
        assert_eq!(params.get("scope"), Some(&"openid email".into()));
        assert!(!params.contains_key("code_challenge"));
        assert!(request.pkce_verifier.is_none());
    }

    #[test]
    fn pkce_parameters_present_when_enabled() {
        let client = OAuth2Client::new(test_config(true), Duration::from_secs(5));
        let request = client.begin_authorization().unwrap();

        let url = Url::parse(&request.url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().collect();
        assert!(params.contains_key("code_challenge"));
        assert_eq!(params.get("code_challenge_method"), Some(&"S256".into()));
        assert!(request.pkce_verifier.is_some());
    }

    #[test]
    fn state_tokens_never_repeat() {
        let client = OAuth2Client::new(test_config(false), Duration::from_secs(5));
        let first = client.begin_authorization().unwrap();
        let second = client.begin_authorization().unwrap();

        assert_ne!(first.state, second.state);
        assert!(first.state.len() >= 32);
    }
}
