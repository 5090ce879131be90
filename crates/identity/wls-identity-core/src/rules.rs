//! Claim-to-account mapping rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Names of the claim keys carrying the wiki username and account email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimFieldMap {
    #[serde(default = "default_username_field")]
    pub username: String,
    #[serde(default = "default_email_field")]
    pub email: String,
}

impl Default for ClaimFieldMap {
    fn default() -> Self {
        Self {
            username: default_username_field(),
            email: default_email_field(),
        }
    }
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_email_field() -> String {
    "email".to_string()
}

/// Grants a fixed privileged group when `claims[claim] == expected`.
/// The grant is additive only; a later login that no longer matches does
/// not take the group away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminTrigger {
    pub claim: String,
    pub expected: Value,
    #[serde(default = "default_admin_group")]
    pub group: String,
}

fn default_admin_group() -> String {
    "sysop".to_string()
}

/// Mirrors a provider role list onto prefixed local groups. The desired
/// set fully replaces previously assigned groups carrying the prefix;
/// groups outside the prefix namespace are never touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicGroupRule {
    pub claim: String,
    #[serde(default = "default_group_prefix")]
    pub prefix: String,
}

fn default_group_prefix() -> String {
    "oauth_".to_string()
}

/// Optional group-mapping rules; absent blocks are skipped entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRules {
    pub admin_trigger: Option<AdminTrigger>,
    /// claim key -> group name, granted while the claim is exactly `true`.
    pub static_groups: BTreeMap<String, String>,
    pub dynamic_groups: Option<DynamicGroupRule>,
}
