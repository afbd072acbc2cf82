use super::{DetailKind, Rule, Watcher, WorkItem};
use crate::domain::{LifecycleItem, LifecycleState};
use crate::store::Versioned;

/// Editorial dispatch
pub fn rule_for(state: LifecycleState) -> Rule {
    match state {
        LifecycleState::Draft => Rule::RequestDetail(DetailKind::Lifecycle),
        LifecycleState::Submitted => Rule::RequestReview,
        LifecycleState::Approved => Rule::NoAction,
        LifecycleState::Rejected => Rule::NoAction,
        LifecycleState::Deleted => Rule::NoAction,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleWatcher;

impl Watcher<LifecycleItem> for LifecycleWatcher {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn handle(&self, changed: &Versioned<LifecycleItem>) -> WorkItem {
        rule_for(changed.document.state()).apply(changed)
    }
}
