use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use super::{report, Command};
use crate::api::Machine;
use crate::app::App;
use crate::config::ServicesCmsConfig;
use crate::watchers::DispatchOutcome;

pub struct ApplyCommand {
    pub config: ServicesCmsConfig,
    pub machine: Machine,
    pub action: String,
    pub id: String,
    pub payload: Value,
}

impl ApplyCommand {
    pub fn new(config: ServicesCmsConfig, machine: Machine, action: String, id: String) -> Self {
        Self {
            config,
            machine,
            action,
            id,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Payload from `--payload` or `--payload-file`, `null` when neither is given
pub fn read_payload(inline: Option<&str>, file: Option<&Path>) -> Result<Value> {
    match (inline, file) {
        (Some(text), _) => serde_json::from_str(text).context("parsing --payload as JSON"),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading payload file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing payload file {}", path.display()))
        }
        (None, None) => Ok(Value::Null),
    }
}

impl Command for ApplyCommand {
    async fn execute(&self) -> Result<()> {
        let app = App::build(&self.config).await?;
        let mut subscriptions = app.subscribe();

        let response = app
            .controller()
            .dispatch(self.machine, &self.action, &self.id, self.payload.clone())
            .await;

        // Watchers run before the result is reported, failed request or not
        for outcome in app.drain(&mut subscriptions).await {
            match outcome {
                DispatchOutcome::Delivered(item) => {
                    eprintln!("📬 {} queued for {}", item.kind(), self.id)
                }
                DispatchOutcome::Failed(item) => {
                    eprintln!("⚠️  {} could not be queued for {}", item.kind(), self.id)
                }
                DispatchOutcome::Skipped => {}
            }
        }

        report(&response)
    }
}
