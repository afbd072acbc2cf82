use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, Instrument};

use super::{Watcher, WorkItem, WorkSink};
use crate::store::{Document, FeedReceiver, Versioned};
use crate::telemetry::create_watcher_span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The watcher answered `NoAction`
    Skipped,
    Delivered(WorkItem),
    /// Publishing failed or timed out; already logged
    Failed(WorkItem),
}

/// Counters for one `run` of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub received: u64,
    pub delivered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Connects a change feed to a watcher and a sink
pub struct WatcherPipeline<D> {
    watcher: Arc<dyn Watcher<D>>,
    sink: Arc<dyn WorkSink>,
    publish_timeout: Duration,
}

impl<D: Document> WatcherPipeline<D> {
    pub fn new(watcher: Arc<dyn Watcher<D>>, sink: Arc<dyn WorkSink>) -> Self {
        Self {
            watcher,
            sink,
            publish_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn name(&self) -> &'static str {
        self.watcher.name()
    }

    /// Map one committed write and publish the result. Never fails.
    pub async fn process(&self, changed: &Versioned<D>) -> DispatchOutcome {
        let span = create_watcher_span(self.name(), &changed.id, changed.version.as_str());
        async move {
            let item = self.watcher.handle(changed);
            if !item.is_actionable() {
                debug!("No action for committed write");
                return DispatchOutcome::Skipped;
            }

            match timeout(self.publish_timeout, self.sink.publish(&item)).await {
                Ok(Ok(())) => {
                    info!(
                        work_item = item.kind(),
                        subject = item.subject_id(),
                        "Work item published"
                    );
                    DispatchOutcome::Delivered(item)
                }
                Ok(Err(e)) => {
                    error!(work_item = item.kind(), error = %e, "Failed to publish work item");
                    DispatchOutcome::Failed(item)
                }
                Err(_) => {
                    error!(
                        work_item = item.kind(),
                        timeout_ms = self.publish_timeout.as_millis() as u64,
                        "Timed out publishing work item"
                    );
                    DispatchOutcome::Failed(item)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Consume the feed until it closes
    pub async fn run(&self, mut receiver: FeedReceiver<D>) -> PipelineReport {
        let mut report = PipelineReport::default();
        info!(watcher = self.name(), "Watcher pipeline started");

        while let Some(changed) = receiver.recv().await {
            report.received += 1;
            match self.process(&changed).await {
                DispatchOutcome::Skipped => report.skipped += 1,
                DispatchOutcome::Delivered(_) => report.delivered += 1,
                DispatchOutcome::Failed(_) => report.failed += 1,
            }
        }

        info!(watcher = self.name(), ?report, "Watcher pipeline stopped");
        report
    }

    pub fn spawn(
        self: Arc<Self>,
        receiver: FeedReceiver<D>,
    ) -> JoinHandle<PipelineReport> {
        tokio::spawn(async move { self.run(receiver).await })
    }
}
