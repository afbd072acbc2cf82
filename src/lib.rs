// Services CMS Library - editorial and publication lifecycles for services
// This exposes the core components for testing and integration

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod fsm;
pub mod store;
pub mod telemetry;
pub mod watchers;

// Re-export key types for easy access
pub use api::{status_for, ApiResponse, Machine, ServiceController};
pub use app::App;
pub use cache::{CacheError, ReferenceSource, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ServicesCmsConfig, StoreBackend};
pub use domain::{
    lifecycle_table, publication_table, LifecycleAction, LifecycleState, PublicationAction,
    PublicationState, Service, ServiceData,
};
pub use fsm::{FsmError, FsmRuntime, TransitionTable, TransitionTableBuilder, ValidationError};
pub use store::{
    ChangeFeed, FileSystemStore, InMemoryStore, StoreError, VersionToken, Versioned,
    VersionedStore,
};
pub use telemetry::{generate_correlation_id, init_telemetry};
pub use watchers::{
    HistoricizationWatcher, LifecycleWatcher, MemorySink, PublicationDetailWatcher, Watcher,
    WatcherPipeline, WorkItem, WorkSink,
};
