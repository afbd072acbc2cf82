use super::{DetailKind, Rule, Watcher, WorkItem};
use crate::domain::{PublicationItem, PublicationState};
use crate::store::Versioned;

pub fn detail_rule_for(state: PublicationState) -> Rule {
    match state {
        PublicationState::Published => Rule::RequestDetail(DetailKind::Publication),
        PublicationState::Unpublished => Rule::NoAction,
    }
}

/// Every publication change is archived, not only going live
pub fn history_rule_for(state: PublicationState) -> Rule {
    match state {
        PublicationState::Published => Rule::RequestHistoricization,
        PublicationState::Unpublished => Rule::RequestHistoricization,
    }
}

/// Keeps the public detail record in step with what is live
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicationDetailWatcher;

impl Watcher<PublicationItem> for PublicationDetailWatcher {
    fn name(&self) -> &'static str {
        "publication_detail"
    }

    fn handle(&self, changed: &Versioned<PublicationItem>) -> WorkItem {
        detail_rule_for(changed.document.state()).apply(changed)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HistoricizationWatcher;

impl Watcher<PublicationItem> for HistoricizationWatcher {
    fn name(&self) -> &'static str {
        "historicization"
    }

    fn handle(&self, changed: &Versioned<PublicationItem>) -> WorkItem {
        history_rule_for(changed.document.state()).apply(changed)
    }
}
