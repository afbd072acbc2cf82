// Dependency-injection root: wires stores, machines, cache and watchers

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::ServiceController;
use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{ServicesCmsConfig, StoreBackend};
use crate::domain::{
    lifecycle_table, publication_table, LifecycleItem, PublicationItem, StaticTopics,
    LIFECYCLE_MACHINE, PUBLICATION_MACHINE,
};
use crate::fsm::FsmRuntime;
use crate::store::{
    ChangeFeed, Document, FeedReceiver, FileSystemStore, InMemoryStore, VersionedStore,
};
use crate::watchers::{
    DispatchOutcome, HistoricizationWatcher, JsonLinesSink, LifecycleWatcher, MemorySink,
    PipelineReport, PublicationDetailWatcher, WatcherPipeline, WorkSink,
};

/// One store seen both as a CAS store and as a change feed
struct StoreHandles<D> {
    store: Arc<dyn VersionedStore<D>>,
    feed: Arc<dyn ChangeFeed<D>>,
}

fn open_store<D: Document>(
    config: &ServicesCmsConfig,
    machine: &str,
    clock: Arc<dyn Clock>,
) -> Result<StoreHandles<D>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryStore::<D>::with_clock(clock));
            Ok(StoreHandles {
                store: store.clone(),
                feed: store,
            })
        }
        StoreBackend::Filesystem => {
            let directory = config.store.directory.join(machine);
            let store = Arc::new(
                FileSystemStore::<D>::open_with_clock(&directory, clock)
                    .with_context(|| format!("opening store at {}", directory.display()))?,
            );
            Ok(StoreHandles {
                store: store.clone(),
                feed: store,
            })
        }
    }
}

/// Receivers opened before a request, drained after it
pub struct Subscriptions {
    lifecycle: Vec<FeedReceiver<LifecycleItem>>,
    publication: Vec<FeedReceiver<PublicationItem>>,
}

pub struct App {
    controller: ServiceController,
    lifecycle_feed: Arc<dyn ChangeFeed<LifecycleItem>>,
    publication_feed: Arc<dyn ChangeFeed<PublicationItem>>,
    lifecycle_pipelines: Vec<Arc<WatcherPipeline<LifecycleItem>>>,
    publication_pipelines: Vec<Arc<WatcherPipeline<PublicationItem>>>,
}

impl App {
    /// Build with the configured JSON lines sink and the system clock
    pub async fn build(config: &ServicesCmsConfig) -> Result<Self> {
        let sink = JsonLinesSink::open(&config.sink.path)
            .await
            .with_context(|| format!("opening work item sink {}", config.sink.path.display()))?;
        Self::with_sink(config, Arc::new(sink), Arc::new(SystemClock))
    }

    /// Wiring for commands that only read; the configured sink is never opened
    pub fn read_only(config: &ServicesCmsConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(MemorySink::new()), Arc::new(SystemClock))
    }

    pub fn with_sink(
        config: &ServicesCmsConfig,
        sink: Arc<dyn WorkSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let lifecycle = open_store::<LifecycleItem>(config, LIFECYCLE_MACHINE, clock.clone())?;
        let publication =
            open_store::<PublicationItem>(config, PUBLICATION_MACHINE, clock.clone())?;

        let timeouts = config.runtime_timeouts();
        let lifecycle_runtime =
            FsmRuntime::new(lifecycle_table()?, lifecycle.store).with_timeouts(timeouts);
        let publication_runtime =
            FsmRuntime::new(publication_table()?, publication.store).with_timeouts(timeouts);

        let topics = TtlCache::new(
            Arc::new(StaticTopics::new(config.topics.list.clone())),
            clock,
            config.topics_ttl(),
        );

        let publish_timeout = config.publish_timeout();
        let lifecycle_pipelines = vec![Arc::new(
            WatcherPipeline::<LifecycleItem>::new(Arc::new(LifecycleWatcher), sink.clone())
                .with_publish_timeout(publish_timeout),
        )];
        let publication_pipelines = vec![
            Arc::new(
                WatcherPipeline::<PublicationItem>::new(
                    Arc::new(PublicationDetailWatcher),
                    sink.clone(),
                )
                .with_publish_timeout(publish_timeout),
            ),
            Arc::new(
                WatcherPipeline::<PublicationItem>::new(Arc::new(HistoricizationWatcher), sink)
                    .with_publish_timeout(publish_timeout),
            ),
        ];

        info!(backend = ?config.store.backend, "Application wired");

        Ok(Self {
            controller: ServiceController::new(
                Arc::new(lifecycle_runtime),
                Arc::new(publication_runtime),
                Arc::new(topics),
            ),
            lifecycle_feed: lifecycle.feed,
            publication_feed: publication.feed,
            lifecycle_pipelines,
            publication_pipelines,
        })
    }

    pub fn controller(&self) -> &ServiceController {
        &self.controller
    }

    /// One receiver per pipeline, to be drained with `drain`
    pub fn subscribe(&self) -> Subscriptions {
        Subscriptions {
            lifecycle: self
                .lifecycle_pipelines
                .iter()
                .map(|_| self.lifecycle_feed.subscribe())
                .collect(),
            publication: self
                .publication_pipelines
                .iter()
                .map(|_| self.publication_feed.subscribe())
                .collect(),
        }
    }

    /// Run every pipeline over the commits buffered since `subscribe`
    pub async fn drain(&self, subscriptions: &mut Subscriptions) -> Vec<DispatchOutcome> {
        let mut outcomes =
            drain_feed(&self.lifecycle_pipelines, &mut subscriptions.lifecycle).await;
        outcomes.extend(
            drain_feed(&self.publication_pipelines, &mut subscriptions.publication).await,
        );
        outcomes
    }

    /// Run every pipeline on its own task until the feeds close
    pub fn spawn_pipelines(&self) -> Vec<JoinHandle<PipelineReport>> {
        let lifecycle = self
            .lifecycle_pipelines
            .iter()
            .map(|p| Arc::clone(p).spawn(self.lifecycle_feed.subscribe()));
        let publication = self
            .publication_pipelines
            .iter()
            .map(|p| Arc::clone(p).spawn(self.publication_feed.subscribe()));
        lifecycle.chain(publication).collect()
    }
}

async fn drain_feed<D: Document>(
    pipelines: &[Arc<WatcherPipeline<D>>],
    receivers: &mut [FeedReceiver<D>],
) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::new();
    for (pipeline, receiver) in pipelines.iter().zip(receivers.iter_mut()) {
        loop {
            match receiver.try_recv() {
                Ok(changed) => outcomes.push(pipeline.process(&changed).await),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Machine;
    use crate::domain::service::fixtures::service_data;
    use crate::watchers::{MemorySink, WorkItem};
    use serde_json::Value;

    fn memory_config() -> ServicesCmsConfig {
        let mut config = ServicesCmsConfig::default();
        config.store.backend = StoreBackend::Memory;
        config
    }

    #[tokio::test]
    async fn test_drain_runs_watchers_for_each_commit() {
        let sink = Arc::new(MemorySink::new());
        let app = App::with_sink(&memory_config(), sink.clone(), Arc::new(SystemClock)).unwrap();
        let mut subscriptions = app.subscribe();

        let payload = serde_json::to_value(service_data("Waste tax")).unwrap();
        let created = app
            .controller()
            .dispatch(Machine::Lifecycle, "create", "S1", payload)
            .await;
        assert_eq!(created.status, 200);

        let outcomes = app.drain(&mut subscriptions).await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            sink.items().await.as_slice(),
            [WorkItem::RequestDetailLifecycle(_)]
        ));

        assert!(app.drain(&mut subscriptions).await.is_empty());
    }

    #[tokio::test]
    async fn test_filesystem_backend_uses_a_directory_per_machine() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ServicesCmsConfig::default();
        config.store.directory = dir.path().to_path_buf();

        let app =
            App::with_sink(&config, Arc::new(MemorySink::new()), Arc::new(SystemClock)).unwrap();
        let payload = serde_json::to_value(service_data("Waste tax")).unwrap();
        app.controller()
            .dispatch(Machine::Lifecycle, "create", "S1", payload)
            .await;
        let missing = app
            .controller()
            .dispatch(Machine::Publication, "publish", "S1", Value::Null)
            .await;

        assert_eq!(missing.status, 404);
        assert!(dir.path().join("lifecycle").join("S1.json").exists());
        assert!(!dir.path().join("publication").join("S1.json").exists());
    }

    #[tokio::test]
    async fn test_read_only_app_leaves_sink_file_alone() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ServicesCmsConfig::default();
        config.store.directory = dir.path().join("store");
        config.sink.path = dir.path().join("work-items.jsonl");

        let app = App::read_only(&config).unwrap();
        assert_eq!(app.controller().topics().await.status, 200);
        assert_eq!(app.controller().show(Machine::Lifecycle, "S1").await.status, 404);
        assert!(!config.sink.path.exists());
    }
}
