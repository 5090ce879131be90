//! OAuth2 authorization-code flow against an external identity provider.
//!
//! This is strictly a relying party: it builds the authorization redirect
//! with a fresh anti-forgery state token, exchanges the returned code for
//! an access token, and fetches the resource-owner claims. Persisting the
//! state across the round trip is the caller's job (see the session seam
//! in `wls-identity-core`).

pub mod client;
pub mod config;
pub mod error;
pub mod types;


pub use client::{OAuth2Client, PkceChallenge};
pub use config::{ConfigError, ProviderConfig, TokenDelivery};
pub use error::{IdentityProviderError, OAuth2Result};
pub use types::{AuthorizationRequest, CallbackParams, TokenResponse};
