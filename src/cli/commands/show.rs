use anyhow::Result;

use super::{report, Command};
use crate::api::Machine;
use crate::app::App;
use crate::config::ServicesCmsConfig;

pub struct ShowCommand {
    pub config: ServicesCmsConfig,
    pub machine: Machine,
    pub id: String,
}

impl Command for ShowCommand {
    async fn execute(&self) -> Result<()> {
        let app = App::read_only(&self.config)?;
        report(&app.controller().show(self.machine, &self.id).await)
    }
}
