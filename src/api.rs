// Inbound interface: (machine, action, id, JSON payload) -> status + body

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::domain::{
    ActionParseError, LifecycleAction, LifecycleRuntime, PublicationAction, PublicationRuntime,
    RequestAction, ServiceData, Topic,
};
use crate::fsm::{FsmAction, FsmError, FsmRuntime, FsmState, ValidationError};
use crate::store::{Document, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Lifecycle,
    Publication,
}

impl Machine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Machine::Lifecycle => "lifecycle",
            Machine::Publication => "publication",
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Machine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lifecycle" => Ok(Machine::Lifecycle),
            "publication" => Ok(Machine::Publication),
            other => Err(format!(
                "unknown machine {other:?}, expected lifecycle or publication"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    pub fn error(status: u16, kind: &str, message: impl fmt::Display) -> Self {
        Self {
            status,
            body: Some(json!({ "error": kind, "message": message.to_string() })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP status for a failed `apply`
pub fn status_for(err: &FsmError) -> u16 {
    match err {
        FsmError::NotFound { .. } => 404,
        FsmError::Validation(_) => 400,
        FsmError::Conflict { .. } => 409,
        FsmError::Throttled { .. } => 429,
        FsmError::Internal { .. } => 500,
    }
}

/// Error body carries `retryable` so callers know whether to re-read and retry
fn from_fsm_error(err: &FsmError) -> ApiResponse {
    let mut response = ApiResponse::error(status_for(err), err.kind(), err);
    if let Some(Value::Object(body)) = response.body.as_mut() {
        body.insert("retryable".to_string(), Value::Bool(err.is_retryable()));
    }
    response
}

fn from_parse_error(err: &ActionParseError) -> ApiResponse {
    ApiResponse::error(400, "bad_request", err)
}

fn to_body<D: Serialize>(record: &Versioned<D>) -> ApiResponse {
    match serde_json::to_value(record) {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => ApiResponse::error(500, "internal", e),
    }
}

/// Entry point used by controllers and the CLI
pub struct ServiceController {
    lifecycle: Arc<LifecycleRuntime>,
    publication: Arc<PublicationRuntime>,
    topics: Arc<TtlCache<Vec<Topic>>>,
}

impl ServiceController {
    pub fn new(
        lifecycle: Arc<LifecycleRuntime>,
        publication: Arc<PublicationRuntime>,
        topics: Arc<TtlCache<Vec<Topic>>>,
    ) -> Self {
        Self {
            lifecycle,
            publication,
            topics,
        }
    }

    pub async fn dispatch(
        &self,
        machine: Machine,
        action: &str,
        id: &str,
        payload: Value,
    ) -> ApiResponse {
        let response = match machine {
            Machine::Lifecycle => match LifecycleAction::from_request(action, payload) {
                Ok(action) => match self.check_topic(&action).await {
                    Ok(()) => apply(&self.lifecycle, id, action).await,
                    Err(rejected) => rejected,
                },
                Err(e) => from_parse_error(&e),
            },
            Machine::Publication => match PublicationAction::from_request(action, payload) {
                Ok(action) => apply(&self.publication, id, action).await,
                Err(e) => from_parse_error(&e),
            },
        };

        info!(
            machine = %machine,
            action = action,
            id = id,
            status = response.status,
            "Request handled"
        );
        response
    }

    /// Current record, 404 when absent
    pub async fn show(&self, machine: Machine, id: &str) -> ApiResponse {
        match machine {
            Machine::Lifecycle => show(&self.lifecycle, id).await,
            Machine::Publication => show(&self.publication, id).await,
        }
    }

    pub async fn topics(&self) -> ApiResponse {
        match self.topics.get().await {
            Ok(topics) => ApiResponse::ok(json!(topics)),
            Err(e) => ApiResponse::error(500, "internal", e),
        }
    }

    /// Create and edit must reference a known topic when they name one
    async fn check_topic(&self, action: &LifecycleAction) -> Result<(), ApiResponse> {
        let data: &ServiceData = match action {
            LifecycleAction::Create { data } | LifecycleAction::Edit { data } => data,
            _ => return Ok(()),
        };
        let Some(topic_id) = data.metadata.topic_id else {
            return Ok(());
        };

        let topics = self.topics.get().await.map_err(|e| {
            warn!(error = %e, "Topics unavailable");
            ApiResponse::error(500, "internal", e)
        })?;
        if topics.iter().any(|t| t.id == topic_id) {
            Ok(())
        } else {
            let err = FsmError::from(ValidationError::InvalidPayload {
                action: action.kind().to_string(),
                reason: format!("unknown topic {topic_id}"),
            });
            Err(from_fsm_error(&err))
        }
    }
}

async fn apply<T, S, A>(runtime: &FsmRuntime<T, S, A>, id: &str, action: A) -> ApiResponse
where
    T: Document,
    S: FsmState + Document,
    A: FsmAction + RequestAction,
{
    let with_body = action.responds_with_body();
    match runtime.apply(id, action).await {
        Ok(committed) if with_body => to_body(&committed),
        Ok(_) => ApiResponse::no_content(),
        Err(e) => from_fsm_error(&e),
    }
}

async fn show<T, S, A>(runtime: &FsmRuntime<T, S, A>, id: &str) -> ApiResponse
where
    T: Document,
    S: FsmState + Document,
    A: FsmAction,
{
    match runtime.get(id).await {
        Ok(Some(record)) => to_body(&record),
        Ok(None) => from_fsm_error(&FsmError::NotFound {
            machine: runtime.machine(),
            id: id.to_string(),
        }),
        Err(e) => from_fsm_error(&e),
    }
}
