//! Identity-provider configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use wls_identity_core::{ClaimFieldMap, GroupRules};

/// Startup-time configuration failure; fatal, the module must not come up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing or empty configuration field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field} URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("dynamic group prefix must not be empty")]
    EmptyGroupPrefix,
}

/// How the access token is presented to the resource-owner endpoint.
///
/// Most providers take a bearer header; a few legacy ones want the token
/// as a query parameter instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenDelivery {
    BearerHeader,
    QueryParameter(String),
}

impl Default for TokenDelivery {
    fn default() -> Self {
        Self::BearerHeader
    }
}

/// Static description of the identity provider. Loaded once at startup,
/// immutable afterwards and shared by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name used on the status page.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    pub authorize_url: String,
    pub token_url: String,
    pub resource_owner_url: String,

    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub token_delivery: TokenDelivery,

    /// Send a PKCE S256 challenge alongside the state token.
    #[serde(default)]
    pub use_pkce: bool,

    #[serde(default)]
    pub claim_fields: ClaimFieldMap,

    #[serde(default)]
    pub group_rules: GroupRules,
}

fn default_service_name() -> String {
    "OAuth2".to_string()
}

impl ProviderConfig {
    /// Validate endpoints and mapping rules before the module comes up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::MissingField("client_secret"));
        }
        if self.claim_fields.username.is_empty() {
            return Err(ConfigError::MissingField("claim_fields.username"));
        }
        if self.claim_fields.email.is_empty() {
            return Err(ConfigError::MissingField("claim_fields.email"));
        }

        Self::check_url("redirect_uri", &self.redirect_uri)?;
        Self::check_url("authorize_url", &self.authorize_url)?;
        Self::check_url("token_url", &self.token_url)?;
        Self::check_url("resource_owner_url", &self.resource_owner_url)?;

        if let Some(rule) = &self.group_rules.dynamic_groups {
            if rule.prefix.is_empty() {
                return Err(ConfigError::EmptyGroupPrefix);
            }
        }

        if let TokenDelivery::QueryParameter(name) = &self.token_delivery {
            if name.is_empty() {
                return Err(ConfigError::MissingField("token_delivery"));
            }
        }

        Ok(())
    }

    fn check_url(field: &'static str, raw: &str) -> Result<(), ConfigError> {
        Url::parse(raw)
            .map(|_| ())
            .map_err(|source| ConfigError::InvalidUrl { field, source })
    }
}
