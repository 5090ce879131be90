//! Host session seam for the redirect round trip.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session backend failure: {0}")]
    Backend(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Access to the current browser session, provided by the host.
///
/// Scoped to one browser session and must give read-your-writes within it,
/// so the anti-forgery state written during the login redirect is visible
/// when the provider calls back.
#[async_trait]
pub trait SessionBridge: Send + Sync {
    /// Keep the session alive across the redirect to the provider.
    async fn persist(&self) -> SessionResult<()>;

    async fn set(&self, key: &str, value: &str) -> SessionResult<()>;

    async fn get(&self, key: &str) -> SessionResult<Option<String>>;

    async fn remove(&self, key: &str) -> SessionResult<()>;

    /// Flush pending writes to the backing store.
    async fn save(&self) -> SessionResult<()>;
}

/// In-memory session double for tests and demos.
#[derive(Clone, Default)]
pub struct InMemorySessionBridge {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySessionBridge {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBridge for InMemorySessionBridge {
    async fn persist(&self) -> SessionResult<()> {
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> SessionResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn save(&self) -> SessionResult<()> {
        Ok(())
    }
}
