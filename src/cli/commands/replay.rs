use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

use super::Command;
use crate::api::Machine;
use crate::domain::{LifecycleItem, PublicationItem};
use crate::watchers::{
    HistoricizationWatcher, LifecycleWatcher, PublicationDetailWatcher, Watcher, WorkItem,
};

/// Re-derive the work items for a record, e.g. after a sink outage
pub struct ReplayCommand {
    pub machine: Machine,
    pub file: PathBuf,
}

pub fn replay(machine: Machine, record: &Value) -> Vec<(&'static str, WorkItem)> {
    fn run<D: serde::de::DeserializeOwned>(
        watcher: &dyn Watcher<D>,
        record: &Value,
    ) -> (&'static str, WorkItem) {
        (watcher.name(), watcher.handle_raw(record))
    }

    match machine {
        Machine::Lifecycle => vec![run::<LifecycleItem>(&LifecycleWatcher, record)],
        Machine::Publication => vec![
            run::<PublicationItem>(&PublicationDetailWatcher, record),
            run::<PublicationItem>(&HistoricizationWatcher, record),
        ],
    }
}

impl Command for ReplayCommand {
    async fn execute(&self) -> Result<()> {
        let text = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("reading record {}", self.file.display()))?;
        let record: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing record {}", self.file.display()))?;

        for (watcher, item) in replay(self.machine, &record) {
            println!("{}", serde_json::json!({ "watcher": watcher, "work_item": item }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_record_replays_as_no_action() {
        let items = replay(Machine::Publication, &json!({ "unexpected": true }));
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|(_, item)| *item == WorkItem::NoAction));
        assert_eq!(items[0].0, "publication_detail");
    }
}
