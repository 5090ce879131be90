//! Reconciliation of provider claims onto local wiki accounts.
//!
//! [`IdentityReconciler::reconcile`] is the single entry point: given a
//! normalized claim set it looks the account up by email, creates it when
//! missing, refreshes name and email on every login, and applies the
//! configured group rules. Deliberately independent of the OAuth2 client;
//! it consumes only its output.

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use wls_identity_core::{
    AccountStore, AccountStoreError, ClaimFieldMap, Claims, ClaimsError, GroupRules, LocalAccount,
};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The username or email claim is absent or mis-typed. Usually a
    /// claim-field-map misconfiguration.
    #[error("required claim missing or malformed: {0}")]
    MissingClaim(#[from] ClaimsError),

    /// Dynamic group sync is configured but the role claim is absent.
    /// Treated as an error so a provider hiccup can never wipe every
    /// prefixed group.
    #[error("claim '{0}' absent while dynamic group sync is configured")]
    MissingGroupsClaim(String),

    /// The host's account-creation policy refused the account.
    #[error("account creation failed: {0}")]
    CreateFailed(String),

    #[error("account store failure: {0}")]
    Store(AccountStoreError),
}

impl From<AccountStoreError> for ReconciliationError {
    fn from(err: AccountStoreError) -> Self {
        match err {
            AccountStoreError::CreateRejected(reason) => Self::CreateFailed(reason),
            other => Self::Store(other),
        }
    }
}

/// Turns one claims payload into a create-or-update decision for a local
/// account, including group synchronization.
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<dyn AccountStore>,
    claim_fields: ClaimFieldMap,
    group_rules: GroupRules,
}

impl IdentityReconciler {
    pub fn new(
        store: Arc<dyn AccountStore>,
        claim_fields: ClaimFieldMap,
        group_rules: GroupRules,
    ) -> Self {
        Self {
            store,
            claim_fields,
            group_rules,
        }
    }

    /// Reconcile a login. Idempotent: reapplying identical claims is a
    /// no-op beyond the save call. Nothing is persisted if any step
    /// before the final save fails.
    pub async fn reconcile(&self, claims: &Claims) -> Result<LocalAccount, ReconciliationError> {
        let username = claims.str_claim(&self.claim_fields.username)?.to_string();
        let email = claims.str_claim(&self.claim_fields.email)?.to_string();

        // Resolve the dynamic role list up front so a malformed payload
        // fails before the store is touched.
        let desired_dynamic = self.desired_dynamic_groups(claims)?;

        let mut account = match self.store.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                info!("Creating local account for {}", email);
                self.store.create(&email).await?
            }
        };

        // Refreshed on every login, not only at creation.
        account.real_name = Some(username);
        account.email = email;

        self.apply_admin_trigger(claims, &mut account);
        self.apply_static_groups(claims, &mut account);
        if let Some((prefix, desired)) = desired_dynamic {
            sync_prefixed_groups(&mut account, &prefix, desired);
        }

        self.store.save(&account).await?;
        debug!(
            "Reconciled account {} with groups {:?}",
            account.email, account.groups
        );
        Ok(account)
    }

    fn desired_dynamic_groups(
        &self,
        claims: &Claims,
    ) -> Result<Option<(String, BTreeSet<String>)>, ReconciliationError> {
        let Some(rule) = &self.group_rules.dynamic_groups else {
            return Ok(None);
        };

        let roles = match claims.str_list_claim(&rule.claim) {
            Ok(roles) => roles,
            Err(ClaimsError::Missing(_)) => {
                return Err(ReconciliationError::MissingGroupsClaim(rule.claim.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let desired = roles
            .into_iter()
            .map(|role| format!("{}{}", rule.prefix, role))
            .collect();

        Ok(Some((rule.prefix.clone(), desired)))
    }

    fn apply_admin_trigger(&self, claims: &Claims, account: &mut LocalAccount) {
        let Some(trigger) = &self.group_rules.admin_trigger else {
            return;
        };

        // Additive only: a non-matching login never removes the group.
        if claims.get(&trigger.claim) == Some(&trigger.expected)
            && account.add_group(trigger.group.clone())
        {
            info!(
                "Granting {} to {} via admin trigger",
                trigger.group, account.email
            );
        }
    }

    fn apply_static_groups(&self, claims: &Claims, account: &mut LocalAccount) {
        for (claim, group) in &self.group_rules.static_groups {
            if claims.flag(claim) {
                account.add_group(group.clone());
            }
        }
    }
}

/// Replace the account's prefixed groups with the desired set. Groups
/// outside the prefix namespace are never touched.
fn sync_prefixed_groups(account: &mut LocalAccount, prefix: &str, desired: BTreeSet<String>) {
    let current: BTreeSet<String> = account
        .groups
        .iter()
        .filter(|group| group.starts_with(prefix))
        .cloned()
        .collect();

    for stale in current.difference(&desired) {
        debug!("Removing group {} from {}", stale, account.email);
        account.remove_group(stale);
    }
    for fresh in desired.difference(&current) {
        debug!("Adding group {} to {}", fresh, account.email);
        account.add_group(fresh.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wls_identity_core::{AdminTrigger, DynamicGroupRule, InMemoryAccountStore};

    fn claim_fields() -> ClaimFieldMap {
        ClaimFieldMap {
            username: "name".to_string(),
            email: "email".to_string(),
        }
    }

    fn dynamic_rules() -> GroupRules {
        GroupRules {
            dynamic_groups: Some(DynamicGroupRule {
                claim: "roles".to_string(),
                prefix: "oauth_".to_string(),
            }),
            ..GroupRules::default()
        }
    }

    fn reconciler(store: &InMemoryAccountStore, rules: GroupRules) -> IdentityReconciler {
        IdentityReconciler::new(Arc::new(store.clone()), claim_fields(), rules)
    }

    fn claims(value: serde_json::Value) -> Claims {
        Claims::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn creates_account_from_enveloped_claims() {
        let store = InMemoryAccountStore::new();
        let reconciler = reconciler(&store, dynamic_rules());

        let account = reconciler
            .reconcile(&claims(json!({
                "user": { "email": "a@x.com", "name": "Alice", "roles": ["editor"] }
            })))
            .await
            .unwrap();

        assert_eq!(account.email, "a@x.com");
        assert_eq!(account.real_name, Some("Alice".to_string()));
        assert_eq!(
            account.groups,
            BTreeSet::from(["oauth_editor".to_string()])
        );
        assert_eq!(store.get("a@x.com").await.unwrap(), account);
    }

    #[tokio::test]
    async fn enveloped_and_flat_claims_reconcile_identically() {
        let flat_store = InMemoryAccountStore::new();
        let nested_store = InMemoryAccountStore::new();

        let flat = reconciler(&flat_store, dynamic_rules())
            .reconcile(&claims(json!({
                "email": "a@x.com", "name": "Alice", "roles": ["editor"]
            })))
            .await
            .unwrap();
        let nested = reconciler(&nested_store, dynamic_rules())
            .reconcile(&claims(json!({
                "user": { "email": "a@x.com", "name": "Alice", "roles": ["editor"] }
            })))
            .await
            .unwrap();

        assert_eq!(flat.email, nested.email);
        assert_eq!(flat.real_name, nested.real_name);
        assert_eq!(flat.groups, nested.groups);
    }

    #[tokio::test]
    async fn second_login_replaces_prefixed_groups() {
        let store = InMemoryAccountStore::new();
        let reconciler = reconciler(&store, dynamic_rules());

        reconciler
            .reconcile(&claims(json!({
                "email": "a@x.com", "name": "Alice", "roles": ["editor"]
            })))
            .await
            .unwrap();

        let account = reconciler
            .reconcile(&claims(json!({
                "email": "a@x.com", "name": "Alice", "roles": ["admin"]
            })))
            .await
            .unwrap();

        assert_eq!(
            account.groups,
            BTreeSet::from(["oauth_admin".to_string()])
        );
    }

    #[tokio::test]
    async fn dynamic_sync_is_idempotent() {
        let store = InMemoryAccountStore::new();
        let reconciler = reconciler(&store, dynamic_rules());
        let payload = json!({
            "email": "a@x.com", "name": "Alice", "roles": ["editor", "reviewer"]
        });

        let first = reconciler.reconcile(&claims(payload.clone())).await.unwrap();
        let second = reconciler.reconcile(&claims(payload)).await.unwrap();

        assert_eq!(first.groups, second.groups);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn dynamic_sync_never_touches_unprefixed_groups() {
        let store = InMemoryAccountStore::new();
        let mut existing = LocalAccount::new("a@x.com");
        existing.add_group("bureaucrat");
        existing.add_group("oauth_old");
        store.insert(existing).await;

        let reconciler = reconciler(&store, dynamic_rules());
        let account = reconciler
            .reconcile(&claims(json!({
                "email": "a@x.com", "name": "Alice", "roles": ["editor"]
            })))
            .await
            .unwrap();

        assert_eq!(
            account.groups,
            BTreeSet::from(["bureaucrat".to_string(), "oauth_editor".to_string()])
        );
    }

    #[tokio::test]
    async fn missing_roles_claim_fails_instead_of_wiping_groups() {
        let store = InMemoryAccountStore::new();
        let mut existing = LocalAccount::new("a@x.com");
        existing.add_group("oauth_editor");
        store.insert(existing.clone()).await;

        let reconciler = reconciler(&store, dynamic_rules());
        let result = reconciler
            .reconcile(&claims(json!({ "email": "a@x.com", "name": "Alice" })))
            .await;

        assert!(matches!(
            result,
            Err(ReconciliationError::MissingGroupsClaim(claim)) if claim == "roles"
        ));
        // Untouched on failure.
        assert_eq!(store.get("a@x.com").await.unwrap(), existing);
    }

    #[tokio::test]
    async fn admin_trigger_grants_and_is_sticky() {
        let store = InMemoryAccountStore::new();
        let rules = GroupRules {
            admin_trigger: Some(AdminTrigger {
                claim: "is_staff".to_string(),
                expected: json!(true),
                group: "sysop".to_string(),
            }),
            ..GroupRules::default()
        };
        let reconciler = reconciler(&store, rules);

        let account = reconciler
            .reconcile(&claims(json!({
                "email": "a@x.com", "name": "Alice", "is_staff": true
            })))
            .await
            .unwrap();
        assert!(account.groups.contains("sysop"));

        let account = reconciler
            .reconcile(&claims(json!({
                "email": "a@x.com", "name": "Alice", "is_staff": false
            })))
            .await
            .unwrap();
        assert!(account.groups.contains("sysop"));
    }

    #[tokio::test]
    async fn static_group_map_requires_literal_true() {
        let store = InMemoryAccountStore::new();
        let rules = GroupRules {
            static_groups: [
                ("is_editor".to_string(), "editor".to_string()),
                ("is_bot".to_string(), "bot".to_string()),
                ("is_vip".to_string(), "vip".to_string()),
            ]
            .into(),
            ..GroupRules::default()
        };
        let reconciler = reconciler(&store, rules);

        let account = reconciler
            .reconcile(&claims(json!({
                "email": "a@x.com",
                "name": "Alice",
                "is_editor": true,
                "is_bot": false,
                "is_vip": "yes"
            })))
            .await
            .unwrap();

        assert_eq!(account.groups, BTreeSet::from(["editor".to_string()]));
    }

    #[tokio::test]
    async fn missing_username_or_email_claim_fails() {
        let store = InMemoryAccountStore::new();
        let reconciler = reconciler(&store, GroupRules::default());

        let result = reconciler
            .reconcile(&claims(json!({ "name": "Alice" })))
            .await;
        assert!(matches!(result, Err(ReconciliationError::MissingClaim(_))));

        let result = reconciler
            .reconcile(&claims(json!({ "email": "a@x.com" })))
            .await;
        assert!(matches!(result, Err(ReconciliationError::MissingClaim(_))));
        assert!(store.get("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn rejected_creation_is_create_failed() {
        let store = InMemoryAccountStore::new();
        store.reject_creations("disallowed name").await;
        let reconciler = reconciler(&store, GroupRules::default());

        let result = reconciler
            .reconcile(&claims(json!({ "email": "a@x.com", "name": "Alice" })))
            .await;

        assert!(matches!(
            result,
            Err(ReconciliationError::CreateFailed(reason)) if reason == "disallowed name"
        ));
    }

    #[tokio::test]
    async fn name_and_email_refresh_on_every_login() {
        let store = InMemoryAccountStore::new();
        let mut existing = LocalAccount::new("a@x.com");
        existing.real_name = Some("Old Name".to_string());
        store.insert(existing).await;

        let reconciler = reconciler(&store, GroupRules::default());
        let account = reconciler
            .reconcile(&claims(json!({ "email": "a@x.com", "name": "Alice" })))
            .await
            .unwrap();

        assert_eq!(account.real_name, Some("Alice".to_string()));
    }
}
