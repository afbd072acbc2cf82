use anyhow::Result;

use super::{report, Command};
use crate::app::App;
use crate::config::ServicesCmsConfig;

pub struct TopicsCommand {
    pub config: ServicesCmsConfig,
}

impl Command for TopicsCommand {
    async fn execute(&self) -> Result<()> {
        let app = App::read_only(&self.config)?;
        report(&app.controller().topics().await)
    }
}
