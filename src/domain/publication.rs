// Publication lifecycle: whether the released version of a service is live.
// Independent of the editorial machine and stored under the same service id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::service::Service;
use super::{parse_payload, ActionParseError, RequestAction};
use crate::fsm::{
    FsmAction, FsmRuntime, FsmState, Rejected, Stateful, TableError, TransitionTable,
    TransitionTableBuilder,
};

pub const PUBLICATION_MACHINE: &str = "publication";

pub type PublicationItem = Stateful<Service, PublicationState>;
pub type PublicationRuntime = FsmRuntime<Service, PublicationState, PublicationAction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    Unpublished,
    Published,
}

impl FsmState for PublicationState {
    const ALL: &'static [Self] = &[PublicationState::Unpublished, PublicationState::Published];

    fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Unpublished => "unpublished",
            PublicationState::Published => "published",
        }
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublicationAction {
    /// Copy an approved service into the publication record
    Release { service: Service },
    Publish,
    Unpublish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicationActionKind {
    Release,
    Publish,
    Unpublish,
}

impl PublicationActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationActionKind::Release => "release",
            PublicationActionKind::Publish => "publish",
            PublicationActionKind::Unpublish => "unpublish",
        }
    }
}

impl fmt::Display for PublicationActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationActionKind {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(PublicationActionKind::Release),
            "publish" => Ok(PublicationActionKind::Publish),
            "unpublish" => Ok(PublicationActionKind::Unpublish),
            other => Err(ActionParseError::UnknownAction(other.to_string())),
        }
    }
}

impl FsmAction for PublicationAction {
    type Kind = PublicationActionKind;

    fn kind(&self) -> PublicationActionKind {
        match self {
            PublicationAction::Release { .. } => PublicationActionKind::Release,
            PublicationAction::Publish => PublicationActionKind::Publish,
            PublicationAction::Unpublish => PublicationActionKind::Unpublish,
        }
    }
}

impl RequestAction for PublicationAction {
    fn from_request(name: &str, payload: Value) -> Result<Self, ActionParseError> {
        let kind: PublicationActionKind = name.parse()?;
        Ok(match kind {
            PublicationActionKind::Release => PublicationAction::Release {
                service: parse_payload(kind.as_str(), payload)?,
            },
            PublicationActionKind::Publish => PublicationAction::Publish,
            PublicationActionKind::Unpublish => PublicationAction::Unpublish,
        })
    }

    fn responds_with_body(&self) -> bool {
        matches!(self, PublicationAction::Release { .. })
    }
}

fn released(id: &str, action: &PublicationAction) -> Result<Service, Rejected> {
    match action {
        PublicationAction::Release { service } if service.id != id => Err(Rejected::new(format!(
            "released service {} does not match publication {id}",
            service.id
        ))),
        PublicationAction::Release { service } => {
            service.data.validate()?;
            // Review notes stay with the editorial record
            Ok(Service {
                review: None,
                ..service.clone()
            })
        }
        other => Err(Rejected::new(format!(
            "unexpected payload {:?}",
            other.kind()
        ))),
    }
}

fn keep(current: &Service, _: &PublicationAction) -> Result<Service, Rejected> {
    Ok(current.clone())
}

/// Build the publication transition table
pub fn publication_table(
) -> Result<TransitionTable<PublicationState, PublicationAction, Service>, TableError> {
    use PublicationActionKind as Action;
    use PublicationState as S;

    TransitionTableBuilder::<PublicationState, PublicationAction, Service>::new(
        PUBLICATION_MACHINE,
    )
    .creation(Action::Release, S::Unpublished, released)
    .transition(S::Unpublished, Action::Release, S::Unpublished, |current, action| {
        released(&current.id, action)
    })
    .transition(S::Published, Action::Release, S::Published, |current, action| {
        released(&current.id, action)
    })
    .transition(S::Unpublished, Action::Publish, S::Published, keep)
    .transition(S::Published, Action::Unpublish, S::Unpublished, keep)
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service::fixtures::service_data;
    use crate::domain::Review;
    use serde_json::json;

    #[test]
    fn test_table_builds() {
        let table = publication_table().unwrap();
        assert_eq!(table.machine(), PUBLICATION_MACHINE);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_publish_and_unpublish_toggle() {
        use PublicationActionKind as A;
        use PublicationState as S;
        let table = publication_table().unwrap();

        assert_eq!(
            table.lookup(Some(S::Unpublished), A::Publish).map(|t| t.to()),
            Some(S::Published)
        );
        assert_eq!(
            table.lookup(Some(S::Published), A::Unpublish).map(|t| t.to()),
            Some(S::Unpublished)
        );
        assert!(table.lookup(Some(S::Published), A::Publish).is_none());
        assert!(table.lookup(Some(S::Unpublished), A::Unpublish).is_none());
        assert!(table.lookup(None, A::Publish).is_none());
    }

    #[test]
    fn test_release_keeps_live_status() {
        use PublicationActionKind as A;
        use PublicationState as S;
        let table = publication_table().unwrap();
        assert_eq!(
            table.lookup(Some(S::Published), A::Release).map(|t| t.to()),
            Some(S::Published)
        );
        assert_eq!(
            table.lookup(None, A::Release).map(|t| t.to()),
            Some(S::Unpublished)
        );
    }

    #[test]
    fn test_release_strips_review_and_checks_id() {
        let table = publication_table().unwrap();
        let release = table.lookup(None, PublicationActionKind::Release).unwrap();

        let mut service = Service::new("S1", service_data("Waste tax"));
        service.review = Some(Review::Approved {
            approval_date: None,
        });

        let out = release
            .exec("S1", None, &PublicationAction::Release { service: service.clone() })
            .unwrap();
        assert_eq!(out.review, None);

        let err = release
            .exec("S2", None, &PublicationAction::Release { service })
            .unwrap_err();
        assert!(err.reason.contains("does not match"));
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            PublicationAction::from_request("publish", Value::Null).unwrap(),
            PublicationAction::Publish
        );
        assert!(matches!(
            PublicationAction::from_request("approve", json!({})),
            Err(ActionParseError::UnknownAction(_))
        ));
        assert!(matches!(
            PublicationAction::from_request("release", json!({})),
            Err(ActionParseError::InvalidPayload { .. })
        ));
    }
}
