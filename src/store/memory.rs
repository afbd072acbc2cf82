use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use super::{
    validate_id, ChangeFeed, Document, FeedHub, FeedReceiver, StoreError, VersionToken,
    Versioned, VersionedStore,
};
use crate::clock::{Clock, SystemClock};

/// Process-local store; the write lock makes compare-and-swap atomic
pub struct InMemoryStore<D> {
    records: RwLock<HashMap<String, Versioned<D>>>,
    feed: FeedHub<D>,
    clock: Arc<dyn Clock>,
}

impl<D: Document> InMemoryStore<D> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            feed: FeedHub::new(),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<D: Document> Default for InMemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D: Document> VersionedStore<D> for InMemoryStore<D> {
    async fn fetch(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        validate_id(id)?;
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save(
        &self,
        id: &str,
        document: D,
        expected: Option<&VersionToken>,
    ) -> Result<Versioned<D>, StoreError> {
        validate_id(id)?;
        let mut records = self.records.write().await;

        let actual = records.get(id).map(|r| r.version.clone());
        if actual.as_ref() != expected {
            warn!(
                id = %id,
                expected = ?expected,
                actual = ?actual,
                "Rejected stale write"
            );
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected.cloned(),
                actual,
            });
        }

        let committed = Versioned {
            id: id.to_string(),
            document,
            version: VersionToken::generate(),
            modified_at: self.clock.now(),
        };
        records.insert(id.to_string(), committed.clone());

        // Published under the lock so the feed preserves per-id commit order
        self.feed.publish(&committed);

        Ok(committed)
    }
}

impl<D: Document> ChangeFeed<D> for InMemoryStore<D> {
    fn subscribe(&self) -> FeedReceiver<D> {
        self.feed.subscribe()
    }
}
