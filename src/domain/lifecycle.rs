// Editorial lifecycle: draft -> submitted -> approved | rejected, and
// deletion from any settled state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::service::{Review, Service, ServiceData};
use super::{parse_payload, ActionParseError, RequestAction};
use crate::fsm::{
    FsmAction, FsmRuntime, FsmState, Rejected, Stateful, TableError, TransitionTable,
    TransitionTableBuilder,
};

pub const LIFECYCLE_MACHINE: &str = "lifecycle";

pub type LifecycleItem = Stateful<Service, LifecycleState>;
pub type LifecycleRuntime = FsmRuntime<Service, LifecycleState, LifecycleAction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Deleted,
}

impl FsmState for LifecycleState {
    const ALL: &'static [Self] = &[
        LifecycleState::Draft,
        LifecycleState::Submitted,
        LifecycleState::Approved,
        LifecycleState::Rejected,
        LifecycleState::Deleted,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Draft => "draft",
            LifecycleState::Submitted => "submitted",
            LifecycleState::Approved => "approved",
            LifecycleState::Rejected => "rejected",
            LifecycleState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    Create { data: ServiceData },
    Edit { data: ServiceData },
    Submit,
    Approve { approval_date: Option<DateTime<Utc>> },
    Reject { reason: String },
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleActionKind {
    Create,
    Edit,
    Submit,
    Approve,
    Reject,
    Delete,
}

impl LifecycleActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleActionKind::Create => "create",
            LifecycleActionKind::Edit => "edit",
            LifecycleActionKind::Submit => "submit",
            LifecycleActionKind::Approve => "approve",
            LifecycleActionKind::Reject => "reject",
            LifecycleActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for LifecycleActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleActionKind {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(LifecycleActionKind::Create),
            "edit" => Ok(LifecycleActionKind::Edit),
            "submit" | "request_review" => Ok(LifecycleActionKind::Submit),
            "approve" | "review_approve" => Ok(LifecycleActionKind::Approve),
            "reject" | "review_reject" => Ok(LifecycleActionKind::Reject),
            "delete" => Ok(LifecycleActionKind::Delete),
            other => Err(ActionParseError::UnknownAction(other.to_string())),
        }
    }
}

impl FsmAction for LifecycleAction {
    type Kind = LifecycleActionKind;

    fn kind(&self) -> LifecycleActionKind {
        match self {
            LifecycleAction::Create { .. } => LifecycleActionKind::Create,
            LifecycleAction::Edit { .. } => LifecycleActionKind::Edit,
            LifecycleAction::Submit => LifecycleActionKind::Submit,
            LifecycleAction::Approve { .. } => LifecycleActionKind::Approve,
            LifecycleAction::Reject { .. } => LifecycleActionKind::Reject,
            LifecycleAction::Delete => LifecycleActionKind::Delete,
        }
    }
}

#[derive(Deserialize)]
struct ApprovePayload {
    #[serde(default)]
    approval_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RejectPayload {
    reason: String,
}

impl RequestAction for LifecycleAction {
    fn from_request(name: &str, payload: Value) -> Result<Self, ActionParseError> {
        let kind: LifecycleActionKind = name.parse()?;
        let action = match kind {
            LifecycleActionKind::Create => LifecycleAction::Create {
                data: parse_payload(kind.as_str(), payload)?,
            },
            LifecycleActionKind::Edit => LifecycleAction::Edit {
                data: parse_payload(kind.as_str(), payload)?,
            },
            LifecycleActionKind::Submit => LifecycleAction::Submit,
            LifecycleActionKind::Approve => {
                let p: ApprovePayload = parse_payload(kind.as_str(), payload)?;
                LifecycleAction::Approve {
                    approval_date: p.approval_date,
                }
            }
            LifecycleActionKind::Reject => {
                let p: RejectPayload = parse_payload(kind.as_str(), payload)?;
                LifecycleAction::Reject { reason: p.reason }
            }
            LifecycleActionKind::Delete => LifecycleAction::Delete,
        };
        Ok(action)
    }

    fn responds_with_body(&self) -> bool {
        matches!(
            self,
            LifecycleAction::Create { .. } | LifecycleAction::Edit { .. }
        )
    }
}

fn mismatched(action: &LifecycleAction) -> Rejected {
    Rejected::new(format!("unexpected payload {:?}", action.kind()))
}

fn create_service(id: &str, action: &LifecycleAction) -> Result<Service, Rejected> {
    match action {
        LifecycleAction::Create { data } => {
            data.validate()?;
            Ok(Service::new(id, data.clone()))
        }
        other => Err(mismatched(other)),
    }
}

fn edit_service(current: &Service, action: &LifecycleAction) -> Result<Service, Rejected> {
    match action {
        LifecycleAction::Edit { data } => {
            data.validate()?;
            Ok(Service {
                id: current.id.clone(),
                data: data.clone(),
                review: None,
            })
        }
        other => Err(mismatched(other)),
    }
}

fn submit_service(current: &Service, _: &LifecycleAction) -> Result<Service, Rejected> {
    current.data.validate()?;
    Ok(Service {
        review: None,
        ..current.clone()
    })
}

fn approve_service(current: &Service, action: &LifecycleAction) -> Result<Service, Rejected> {
    match action {
        LifecycleAction::Approve { approval_date } => Ok(Service {
            review: Some(Review::Approved {
                approval_date: *approval_date,
            }),
            ..current.clone()
        }),
        other => Err(mismatched(other)),
    }
}

fn reject_service(current: &Service, action: &LifecycleAction) -> Result<Service, Rejected> {
    match action {
        LifecycleAction::Reject { reason } if reason.trim().is_empty() => {
            Err(Rejected::new("a rejection needs a reason"))
        }
        LifecycleAction::Reject { reason } => Ok(Service {
            review: Some(Review::Rejected {
                reason: reason.clone(),
            }),
            ..current.clone()
        }),
        other => Err(mismatched(other)),
    }
}

fn delete_service(current: &Service, _: &LifecycleAction) -> Result<Service, Rejected> {
    Ok(current.clone())
}

/// Build the editorial transition table
pub fn lifecycle_table(
) -> Result<TransitionTable<LifecycleState, LifecycleAction, Service>, TableError> {
    use LifecycleActionKind as Action;
    use LifecycleState as S;

    let settled = [S::Draft, S::Approved, S::Rejected];

    TransitionTableBuilder::<LifecycleState, LifecycleAction, Service>::new(LIFECYCLE_MACHINE)
        .creation(Action::Create, S::Draft, create_service)
        .transitions_from(&settled, Action::Edit, S::Draft, edit_service)
        .transition(S::Draft, Action::Submit, S::Submitted, submit_service)
        .transition(S::Submitted, Action::Approve, S::Approved, approve_service)
        .transition(S::Submitted, Action::Reject, S::Rejected, reject_service)
        .transitions_from(&settled, Action::Delete, S::Deleted, delete_service)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service::fixtures::service_data;
    use serde_json::json;

    #[test]
    fn test_table_builds() {
        let table = lifecycle_table().unwrap();
        assert_eq!(table.machine(), LIFECYCLE_MACHINE);
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn test_expected_moves() {
        use LifecycleActionKind as A;
        use LifecycleState as S;
        let table = lifecycle_table().unwrap();
        let to = |from: Option<S>, action: A| table.lookup(from, action).map(|t| t.to());

        assert_eq!(to(None, A::Create), Some(S::Draft));
        assert_eq!(to(Some(S::Draft), A::Submit), Some(S::Submitted));
        assert_eq!(to(Some(S::Submitted), A::Approve), Some(S::Approved));
        assert_eq!(to(Some(S::Submitted), A::Reject), Some(S::Rejected));
        assert_eq!(to(Some(S::Approved), A::Delete), Some(S::Deleted));
        assert_eq!(to(Some(S::Rejected), A::Edit), Some(S::Draft));

        assert_eq!(to(Some(S::Submitted), A::Delete), None);
        assert_eq!(to(Some(S::Deleted), A::Edit), None);
        assert_eq!(to(Some(S::Draft), A::Approve), None);
        assert_eq!(to(None, A::Submit), None);
    }

    #[test]
    fn test_deleted_is_terminal() {
        let table = lifecycle_table().unwrap();
        assert!(table.actions_from(Some(LifecycleState::Deleted)).is_empty());
    }

    #[test]
    fn test_create_validates_payload() {
        let table = lifecycle_table().unwrap();
        let create = table.lookup(None, LifecycleActionKind::Create).unwrap();

        let ok = create
            .exec("S1", None, &LifecycleAction::Create { data: service_data("Waste tax") })
            .unwrap();
        assert_eq!(ok.id, "S1");

        let err = create
            .exec("S1", None, &LifecycleAction::Create { data: service_data("") })
            .unwrap_err();
        assert!(err.reason.contains("name"));
    }

    #[test]
    fn test_edit_clears_review() {
        let table = lifecycle_table().unwrap();
        let edit = table
            .lookup(Some(LifecycleState::Rejected), LifecycleActionKind::Edit)
            .unwrap();
        let mut current = Service::new("S1", service_data("Old"));
        current.review = Some(Review::Rejected {
            reason: "typo".to_string(),
        });

        let edited = edit
            .exec("S1", Some(&current), &LifecycleAction::Edit { data: service_data("New") })
            .unwrap();
        assert_eq!(edited.data.name, "New");
        assert_eq!(edited.review, None);
    }

    #[test]
    fn test_reject_requires_reason() {
        let table = lifecycle_table().unwrap();
        let reject = table
            .lookup(Some(LifecycleState::Submitted), LifecycleActionKind::Reject)
            .unwrap();
        let current = Service::new("S1", service_data("Waste tax"));
        let err = reject
            .exec("S1", Some(&current), &LifecycleAction::Reject { reason: " ".to_string() })
            .unwrap_err();
        assert!(err.reason.contains("reason"));
    }

    #[test]
    fn test_parse_actions_with_aliases() {
        let submit = LifecycleAction::from_request("request_review", json!({})).unwrap();
        assert_eq!(submit, LifecycleAction::Submit);
        assert!(!submit.responds_with_body());

        let approve = LifecycleAction::from_request("review_approve", Value::Null).unwrap();
        assert_eq!(approve, LifecycleAction::Approve { approval_date: None });

        let reject =
            LifecycleAction::from_request("review_reject", json!({ "reason": "no logo" })).unwrap();
        assert_eq!(
            reject,
            LifecycleAction::Reject {
                reason: "no logo".to_string()
            }
        );

        let create = LifecycleAction::from_request(
            "create",
            serde_json::to_value(service_data("Waste tax")).unwrap(),
        )
        .unwrap();
        assert!(create.responds_with_body());
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(matches!(
            LifecycleAction::from_request("publish", json!({})),
            Err(ActionParseError::UnknownAction(_))
        ));
        assert!(matches!(
            LifecycleAction::from_request("reject", json!({})),
            Err(ActionParseError::InvalidPayload { .. })
        ));
        assert!(matches!(
            LifecycleAction::from_request("create", json!({ "name": 3 })),
            Err(ActionParseError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_state_names_round_trip_through_serde() {
        for state in LifecycleState::ALL {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.as_str());
        }
    }
}
