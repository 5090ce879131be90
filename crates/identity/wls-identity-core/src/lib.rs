//! Core types and collaborator traits for delegating wiki logins to an
//! external OAuth2 identity provider.
//!
//! This crate carries everything the flow and reconciliation layers share:
//! - [`Claims`], a typed view of the resource-owner payload
//! - [`LocalAccount`] and the [`AccountStore`] trait the host implements
//! - [`SessionBridge`], the host session seam for the redirect round trip
//! - the group-mapping rule types consumed by the reconciler

pub mod account;
pub mod claims;
pub mod rules;
pub mod session;

pub use account::{AccountStore, AccountStoreError, InMemoryAccountStore, LocalAccount};
pub use claims::{Claims, ClaimsError};
pub use rules::{AdminTrigger, ClaimFieldMap, DynamicGroupRule, GroupRules};
pub use session::{InMemorySessionBridge, SessionBridge, SessionError, SessionResult};
