// Time-boxed cache for reference lists (topics and similar)

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("failed to load reference data: {0}")]
    Load(String),
}

/// Loader behind a `TtlCache`
#[async_trait]
pub trait ReferenceSource<T>: Send + Sync {
    async fn load(&self) -> Result<T, CacheError>;
}

struct Entry<T> {
    value: T,
    loaded_at: DateTime<Utc>,
}

/// Caches one value for `ttl`, reloading through its source on expiry
///
/// A failed reload keeps serving the previous value; only a cache that has
/// never loaded reports the error.
pub struct TtlCache<T> {
    source: Arc<dyn ReferenceSource<T>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T: Clone + Send + Sync + 'static> TtlCache<T> {
    pub fn new(source: Arc<dyn ReferenceSource<T>>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self) -> Result<T, CacheError> {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();

        if let Some(entry) = slot.as_ref() {
            if now - entry.loaded_at < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        match self.source.load().await {
            Ok(value) => {
                debug!(ttl_secs = self.ttl.num_seconds(), "Reference data reloaded");
                *slot = Some(Entry {
                    value: value.clone(),
                    loaded_at: now,
                });
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(stale) => {
                    warn!(
                        error = %e,
                        loaded_at = %stale.loaded_at,
                        "Reload failed, serving stale reference data"
                    );
                    Ok(stale.value.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Drop the cached value so the next `get` reloads
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
