//! Login flow for delegating wiki authentication to an OAuth2 provider.
//!
//! [`LoginFlow`] orchestrates the three entry points (begin login, handle
//! callback, show status) over the collaborator seams from
//! `wls-identity-core`; [`http::login_router`] exposes them as a mountable
//! axum router.

pub mod flow;
pub mod http;

pub use flow::{AuthFlowError, LoginFlow, LoginOutcome, LoginStatus, keys};
pub use http::{LoginAction, login_router};
