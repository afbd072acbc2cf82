use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{
    validate_id, ChangeFeed, Document, FeedHub, FeedReceiver, StoreError, VersionToken,
    Versioned, VersionedStore,
};
use crate::clock::{Clock, SystemClock};

const LOCK_FILE: &str = ".store.lock";
const LOCK_ATTEMPTS: u32 = 50;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
const THROTTLE_RETRY_AFTER_MS: u64 = 100;

/// On-disk layout of one record
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord<D> {
    version: VersionToken,
    modified_at: DateTime<Utc>,
    document: D,
}

/// Directory-backed store: one JSON file per id
///
/// Compare-and-swap is serialized through an exclusive `fd-lock` on a lock
/// file in the directory, so concurrent writers in this or other processes
/// see a consistent version. Records are replaced by write-then-rename.
/// A writer that cannot take the lock within `LOCK_ATTEMPTS` tries gets
/// `StoreError::Throttled`.
pub struct FileSystemStore<D> {
    directory: PathBuf,
    feed: Arc<FeedHub<D>>,
    clock: Arc<dyn Clock>,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document> FileSystemStore<D> {
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_clock(directory, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        directory: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        info!(directory = ?directory, "Opened file system store");

        Ok(Self {
            directory,
            feed: Arc::new(FeedHub::new()),
            clock,
            _marker: PhantomData,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn record_path(directory: &Path, id: &str) -> PathBuf {
        directory.join(format!("{id}.json"))
    }

    fn read_record(path: &Path) -> Result<Option<StoredRecord<D>>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_locked(
        directory: &Path,
        id: &str,
        document: D,
        expected: Option<VersionToken>,
        modified_at: DateTime<Utc>,
        feed: &FeedHub<D>,
    ) -> Result<Versioned<D>, StoreError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(directory.join(LOCK_FILE))?;
        let mut lock = FileLock::new(lock_file);
        let mut attempt = 1;
        let _guard = loop {
            match lock.try_write() {
                Ok(guard) => break guard,
                Err(e) if e.kind() == ErrorKind::WouldBlock && attempt < LOCK_ATTEMPTS => {
                    attempt += 1;
                    std::thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    warn!(id = %id, attempts = attempt, "Store lock busy, throttling write");
                    return Err(StoreError::Throttled {
                        id: id.to_string(),
                        retry_after_ms: Some(THROTTLE_RETRY_AFTER_MS),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        };

        let path = Self::record_path(directory, id);
        let actual = Self::read_record(&path)?.map(|r| r.version);
        if actual != expected {
            warn!(
                id = %id,
                expected = ?expected,
                actual = ?actual,
                "Rejected stale write"
            );
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual,
            });
        }

        let record = StoredRecord {
            version: VersionToken::generate(),
            modified_at,
            document,
        };
        let serialized = serde_json::to_vec_pretty(&record)?;

        // Write to temporary file first, then rename (atomic operation)
        let temp_path = directory.join(format!("{id}.json.tmp"));
        fs::write(&temp_path, serialized)?;
        fs::rename(&temp_path, &path)?;

        let committed = Versioned {
            id: id.to_string(),
            document: record.document,
            version: record.version,
            modified_at: record.modified_at,
        };
        feed.publish(&committed);
        Ok(committed)
    }
}

#[async_trait]
impl<D: Document> VersionedStore<D> for FileSystemStore<D> {
    async fn fetch(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        validate_id(id)?;
        let path = Self::record_path(&self.directory, id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: StoredRecord<D> = serde_json::from_slice(&bytes)?;

        Ok(Some(Versioned {
            id: id.to_string(),
            document: record.document,
            version: record.version,
            modified_at: record.modified_at,
        }))
    }

    /// The write runs on a blocking thread that is not cancelled with the
    /// caller: when a caller's timeout fires first, the write may or may not
    /// have committed (and reached the change feed). Re-read to find out.
    async fn save(
        &self,
        id: &str,
        document: D,
        expected: Option<&VersionToken>,
    ) -> Result<Versioned<D>, StoreError> {
        validate_id(id)?;

        let directory = self.directory.clone();
        let id_owned = id.to_string();
        let expected = expected.cloned();
        let modified_at = self.clock.now();
        let feed = self.feed.clone();

        tokio::task::spawn_blocking(move || {
            Self::save_locked(&directory, &id_owned, document, expected, modified_at, &feed)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("store writer task failed: {e}")))?
    }
}

impl<D: Document> ChangeFeed<D> for FileSystemStore<D> {
    fn subscribe(&self) -> FeedReceiver<D> {
        self.feed.subscribe()
    }
}
