// Versioned document store with optimistic concurrency
//
// Every read returns a version token; a write is accepted only when it
// presents the token currently stored (compare-and-swap). Committed writes
// are fanned out on a change feed for the watcher layer.

pub mod feed;
pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use feed::{FeedHub, FeedReceiver};
pub use filesystem::FileSystemStore;
pub use memory::InMemoryStore;

/// Bounds shared by everything the store persists
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Document for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Opaque entity tag assigned by the backend on every commit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as read from, or committed to, the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<D> {
    pub id: String,
    pub document: D,
    pub version: VersionToken,
    /// Backend-assigned last-modified time
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on {id}: expected {expected:?}, found {actual:?}")]
    Conflict {
        id: String,
        expected: Option<VersionToken>,
        actual: Option<VersionToken>,
    },

    #[error("store throttled the request for {id}")]
    Throttled {
        id: String,
        retry_after_ms: Option<u64>,
    },

    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait VersionedStore<D>: Send + Sync {
    /// Absence is `Ok(None)`; errors are reserved for backend failures
    async fn fetch(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError>;

    /// Compare-and-swap write. `expected == None` inserts only if `id` is
    /// absent. On mismatch nothing is written and `Conflict` is returned.
    async fn save(
        &self,
        id: &str,
        document: D,
        expected: Option<&VersionToken>,
    ) -> Result<Versioned<D>, StoreError>;
}

/// Stream of committed writes; every commit after `subscribe` reaches the
/// subscriber, in commit order, however far behind it is
pub trait ChangeFeed<D>: Send + Sync {
    fn subscribe(&self) -> FeedReceiver<D>;
}

/// Ids double as file names and partition keys, so keep them plain
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("S1").is_ok());
        assert!(validate_id("01HZX-service_a").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("with space").is_err());
        assert!(validate_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_generated_tokens_differ() {
        let a = VersionToken::generate();
        let b = VersionToken::generate();
        assert_ne!(a, b);
        assert_eq!(VersionToken::new("v1").to_string(), "v1");
    }
}
