use serde::{Deserialize, Serialize};

use crate::domain::{Organization, Service, ServiceData, ServiceMetadata};
use crate::fsm::{FsmState, Stateful};
use crate::store::{VersionToken, Versioned};

/// Instruction handed to a downstream consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkItem {
    RequestReview(ReviewRequest),
    RequestDetailLifecycle(DetailRequest),
    RequestDetailPublication(DetailRequest),
    RequestHistoricization(HistoricizationRequest),
    NoAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: String,
    pub version: VersionToken,
    pub data: ServiceData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Lifecycle,
    Publication,
}

/// Public-facing detail projection to re-index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRequest {
    pub id: String,
    pub kind: DetailKind,
    pub name: String,
    pub description: String,
    pub organization: Organization,
    pub metadata: ServiceMetadata,
    /// Epoch seconds of the committed write
    pub cms_last_update_ts: i64,
}

/// Point-in-time publication snapshot for the audit history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricizationRequest {
    pub id: String,
    pub state: String,
    pub version: VersionToken,
    /// RFC 3339 rendering of the committed write time
    pub last_update: String,
    pub data: ServiceData,
}

impl WorkItem {
    pub fn review<S>(changed: &Versioned<Stateful<Service, S>>) -> Self {
        WorkItem::RequestReview(ReviewRequest {
            id: changed.id.clone(),
            version: changed.version.clone(),
            data: changed.document.item.data.clone(),
        })
    }

    pub fn detail<S>(kind: DetailKind, changed: &Versioned<Stateful<Service, S>>) -> Self {
        let data = &changed.document.item.data;
        let request = DetailRequest {
            id: changed.id.clone(),
            kind,
            name: data.name.clone(),
            description: data.description.clone(),
            organization: data.organization.clone(),
            metadata: data.metadata.clone(),
            cms_last_update_ts: changed.modified_at.timestamp(),
        };
        match kind {
            DetailKind::Lifecycle => WorkItem::RequestDetailLifecycle(request),
            DetailKind::Publication => WorkItem::RequestDetailPublication(request),
        }
    }

    pub fn historicization<S: FsmState>(changed: &Versioned<Stateful<Service, S>>) -> Self {
        WorkItem::RequestHistoricization(HistoricizationRequest {
            id: changed.id.clone(),
            state: changed.document.fsm.state.as_str().to_string(),
            version: changed.version.clone(),
            last_update: changed.modified_at.to_rfc3339(),
            data: changed.document.item.data.clone(),
        })
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, WorkItem::NoAction)
    }

    /// Same name as the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::RequestReview(_) => "request_review",
            WorkItem::RequestDetailLifecycle(_) => "request_detail_lifecycle",
            WorkItem::RequestDetailPublication(_) => "request_detail_publication",
            WorkItem::RequestHistoricization(_) => "request_historicization",
            WorkItem::NoAction => "no_action",
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        match self {
            WorkItem::RequestReview(r) => Some(&r.id),
            WorkItem::RequestDetailLifecycle(d) | WorkItem::RequestDetailPublication(d) => {
                Some(&d.id)
            }
            WorkItem::RequestHistoricization(h) => Some(&h.id),
            WorkItem::NoAction => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service::fixtures::service_data;
    use crate::domain::PublicationState;
    use crate::fsm::FsmMeta;
    use chrono::{TimeZone, Utc};

    fn published() -> Versioned<Stateful<Service, PublicationState>> {
        Versioned {
            id: "S1".to_string(),
            document: Stateful {
                item: Service::new("S1", service_data("Waste tax")),
                fsm: FsmMeta {
                    state: PublicationState::Published,
                    last_transition: Some("publish".to_string()),
                },
            },
            version: VersionToken::new("v1"),
            modified_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_detail_carries_epoch_seconds() {
        let item = WorkItem::detail(DetailKind::Publication, &published());
        match item {
            WorkItem::RequestDetailPublication(d) => {
                assert_eq!(d.id, "S1");
                assert_eq!(d.cms_last_update_ts, 1_709_294_400);
                assert_eq!(d.kind, DetailKind::Publication);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_historicization_fields() {
        let json = serde_json::to_value(WorkItem::historicization(&published())).unwrap();
        assert_eq!(json["type"], "request_historicization");
        assert_eq!(json["version"], "v1");
        assert_eq!(json["state"], "published");
        assert_eq!(json["last_update"], "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        for item in [
            WorkItem::review(&published()),
            WorkItem::detail(DetailKind::Lifecycle, &published()),
            WorkItem::historicization(&published()),
            WorkItem::NoAction,
        ] {
            let json = serde_json::to_value(&item).unwrap();
            assert_eq!(json["type"], item.kind());
        }
        assert!(!WorkItem::NoAction.is_actionable());
        assert_eq!(WorkItem::NoAction.subject_id(), None);
    }
}
