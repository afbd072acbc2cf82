// Domain machines: editorial lifecycle and publication of services

pub mod lifecycle;
pub mod publication;
pub mod service;
pub mod topics;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use lifecycle::{
    lifecycle_table, LifecycleAction, LifecycleActionKind, LifecycleItem, LifecycleRuntime,
    LifecycleState, LIFECYCLE_MACHINE,
};
pub use publication::{
    publication_table, PublicationAction, PublicationActionKind, PublicationItem,
    PublicationRuntime, PublicationState, PUBLICATION_MACHINE,
};
pub use service::{Organization, Review, Service, ServiceData, ServiceMetadata, ServiceScope};
pub use topics::{StaticTopics, Topic};

#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("invalid payload for {action}: {source}")]
    InvalidPayload {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Actions that can be built from an inbound `(name, JSON payload)` request
pub trait RequestAction: Sized {
    fn from_request(name: &str, payload: Value) -> Result<Self, ActionParseError>;

    /// Whether a successful call answers with the committed item
    fn responds_with_body(&self) -> bool;
}

/// Deserialize a payload, treating `null` as an empty object
pub(crate) fn parse_payload<P: DeserializeOwned>(
    action: &str,
    payload: Value,
) -> Result<P, ActionParseError> {
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload).map_err(|source| ActionParseError::InvalidPayload {
        action: action.to_string(),
        source,
    })
}
