//! Local account record and the host account-store seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AccountStoreError {
    /// The host's account-creation policy refused the new account.
    #[error("account creation rejected: {0}")]
    CreateRejected(String),

    #[error("account store failure: {0}")]
    Backend(String),
}

/// A wiki account as far as login delegation is concerned.
///
/// The host user store owns the record; this system only reads, creates
/// and updates it within a single reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: Uuid,
    pub email: String,
    pub real_name: Option<String>,
    pub groups: BTreeSet<String>,
}

impl LocalAccount {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            real_name: None,
            groups: BTreeSet::new(),
        }
    }

    /// Returns true when the group was not already present.
    pub fn add_group(&mut self, group: impl Into<String>) -> bool {
        self.groups.insert(group.into())
    }

    pub fn remove_group(&mut self, group: &str) -> bool {
        self.groups.remove(group)
    }
}

/// Host user-store seam. Lookup key is the claimed email address.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str)
    -> Result<Option<LocalAccount>, AccountStoreError>;

    /// Create a fresh account for the email. May be rejected by host
    /// naming or creation policy.
    async fn create(&self, email: &str) -> Result<LocalAccount, AccountStoreError>;

    async fn save(&self, account: &LocalAccount) -> Result<(), AccountStoreError>;
}

/// In-memory account store keyed by email, for tests and demos.
///
/// Counts every call so tests can assert the store was never touched on a
/// failed-closed code path.
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<String, LocalAccount>>>,
    calls: Arc<AtomicUsize>,
    deny_create: Arc<RwLock<Option<String>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing account, bypassing the call counter.
    pub async fn insert(&self, account: LocalAccount) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.email.clone(), account);
    }

    pub async fn get(&self, email: &str) -> Option<LocalAccount> {
        let accounts = self.accounts.read().await;
        accounts.get(email).cloned()
    }

    /// Make subsequent `create` calls fail with the given policy reason.
    pub async fn reject_creations(&self, reason: impl Into<String>) {
        let mut deny = self.deny_create.write().await;
        *deny = Some(reason.into());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<LocalAccount>, AccountStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.read().await;
        Ok(accounts.get(email).cloned())
    }

    async fn create(&self, email: &str) -> Result<LocalAccount, AccountStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.deny_create.read().await.clone() {
            return Err(AccountStoreError::CreateRejected(reason));
        }

        let account = LocalAccount::new(email);
        let mut accounts = self.accounts.write().await;
        accounts.insert(email.to_string(), account.clone());
        Ok(account)
    }

    async fn save(&self, account: &LocalAccount) -> Result<(), AccountStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.email.clone(), account.clone());
        Ok(())
    }
}
