// Change watchers: map committed writes to downstream work items
//
// Each watcher owns one `rule_for(state)` match with a row per declared
// state, so a new state does not compile until its dispatch is decided.

pub mod lifecycle;
pub mod pipeline;
pub mod publication;
pub mod sink;
pub mod work_item;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::domain::Service;
use crate::fsm::{FsmState, Stateful};
use crate::store::Versioned;

pub use lifecycle::LifecycleWatcher;
pub use pipeline::{DispatchOutcome, PipelineReport, WatcherPipeline};
pub use publication::{HistoricizationWatcher, PublicationDetailWatcher};
pub use sink::{JsonLinesSink, MemorySink, SinkError, WorkSink};
pub use work_item::{DetailKind, DetailRequest, HistoricizationRequest, ReviewRequest, WorkItem};

/// Dispatch decision for one state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    RequestReview,
    RequestDetail(DetailKind),
    RequestHistoricization,
    NoAction,
}

impl Rule {
    pub fn apply<S: FsmState>(self, changed: &Versioned<Stateful<Service, S>>) -> WorkItem {
        match self {
            Rule::RequestReview => WorkItem::review(changed),
            Rule::RequestDetail(kind) => WorkItem::detail(kind, changed),
            Rule::RequestHistoricization => WorkItem::historicization(changed),
            Rule::NoAction => WorkItem::NoAction,
        }
    }
}

/// Pure, total mapping from a committed write to at most one work item
pub trait Watcher<D>: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, changed: &Versioned<D>) -> WorkItem;

    /// Handle a record as delivered by an untyped feed
    ///
    /// Records that do not decode produce `NoAction` and a warning.
    fn handle_raw(&self, raw: &Value) -> WorkItem
    where
        D: DeserializeOwned,
    {
        match serde_json::from_value::<Versioned<D>>(raw.clone()) {
            Ok(changed) => self.handle(&changed),
            Err(e) => {
                warn!(watcher = self.name(), error = %e, "Malformed change record");
                WorkItem::NoAction
            }
        }
    }
}
