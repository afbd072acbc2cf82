use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

use super::{FsmAction, FsmError, FsmMeta, FsmState, Stateful, TransitionTable, ValidationError};
use crate::store::{Document, StoreError, VersionToken, Versioned, VersionedStore};
use crate::telemetry::{create_transition_span, generate_correlation_id};

/// Upper bounds on each store round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeTimeouts {
    pub fetch: Duration,
    pub save: Duration,
}

impl Default for RuntimeTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(5),
            save: Duration::from_secs(5),
        }
    }
}

/// Executes a transition table against a versioned store
///
/// The runtime holds no item between calls: each `apply` reads, resolves,
/// executes and commits under the version it read. A lost race surfaces as
/// `FsmError::Conflict` and nothing is written.
pub struct FsmRuntime<T, S, A: FsmAction> {
    table: Arc<TransitionTable<S, A, T>>,
    store: Arc<dyn VersionedStore<Stateful<T, S>>>,
    timeouts: RuntimeTimeouts,
}

impl<T, S, A> FsmRuntime<T, S, A>
where
    T: Document,
    S: FsmState + Document,
    A: FsmAction,
{
    pub fn new(
        table: TransitionTable<S, A, T>,
        store: Arc<dyn VersionedStore<Stateful<T, S>>>,
    ) -> Self {
        Self {
            table: Arc::new(table),
            store,
            timeouts: RuntimeTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RuntimeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn machine(&self) -> &'static str {
        self.table.machine()
    }

    pub fn table(&self) -> &TransitionTable<S, A, T> {
        &self.table
    }

    /// Read the current item without transitioning
    pub async fn get(&self, id: &str) -> Result<Option<Versioned<Stateful<T, S>>>, FsmError> {
        self.fetch(id).await
    }

    /// Apply `action` to item `id`
    pub async fn apply(
        &self,
        id: &str,
        action: A,
    ) -> Result<Versioned<Stateful<T, S>>, FsmError> {
        let correlation_id = generate_correlation_id();
        let kind = action.kind();
        let span = create_transition_span(
            self.machine(),
            id,
            &kind.to_string(),
            &correlation_id,
        );

        async move {
            let result = self.apply_inner(id, &action).await;
            match &result {
                Ok(committed) => info!(
                    state = %committed.document.fsm.state,
                    version = %committed.version,
                    "Transition committed"
                ),
                Err(e) => warn!(error = %e, kind = e.kind(), "Transition failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn apply_inner(
        &self,
        id: &str,
        action: &A,
    ) -> Result<Versioned<Stateful<T, S>>, FsmError> {
        let kind = action.kind();
        let current = self.fetch(id).await?;

        let (transition, expected) = match &current {
            Some(read) => {
                let state = read.document.fsm.state;
                let transition = self.table.lookup(Some(state), kind).ok_or_else(|| {
                    ValidationError::IllegalTransition {
                        machine: self.machine(),
                        state: state.to_string(),
                        action: kind.to_string(),
                    }
                })?;
                (transition, Some(read.version.clone()))
            }
            None => match self.table.lookup(None, kind) {
                Some(transition) => (transition, None),
                None => {
                    return Err(FsmError::NotFound {
                        machine: self.machine(),
                        id: id.to_string(),
                    })
                }
            },
        };

        debug!(
            from = ?transition.from(),
            to = %transition.to(),
            creation = transition.is_creation(),
            expected = ?expected,
            "Resolved transition"
        );

        let item = transition
            .exec(id, current.as_ref().map(|r| &r.document.item), action)
            .map_err(|rejected| ValidationError::InvalidPayload {
                action: kind.to_string(),
                reason: rejected.reason,
            })?;

        let next = Stateful {
            item,
            fsm: FsmMeta {
                state: transition.to(),
                last_transition: Some(kind.to_string()),
            },
        };

        self.save(id, next, expected.as_ref()).await
    }

    async fn fetch(&self, id: &str) -> Result<Option<Versioned<Stateful<T, S>>>, FsmError> {
        bounded("fetch", id, self.timeouts.fetch, self.store.fetch(id)).await
    }

    async fn save(
        &self,
        id: &str,
        document: Stateful<T, S>,
        expected: Option<&VersionToken>,
    ) -> Result<Versioned<Stateful<T, S>>, FsmError> {
        bounded(
            "save",
            id,
            self.timeouts.save,
            self.store.save(id, document, expected),
        )
        .await
    }
}

/// A timeout is an internal failure, never a definitive not-found or conflict
async fn bounded<R>(
    operation: &str,
    id: &str,
    limit: Duration,
    call: impl Future<Output = Result<R, StoreError>>,
) -> Result<R, FsmError> {
    match timeout(limit, call).await {
        Ok(result) => result.map_err(FsmError::from),
        Err(_) => Err(FsmError::Internal {
            reason: format!(
                "{operation} of {id} timed out after {}ms",
                limit.as_millis()
            ),
        }),
    }
}
