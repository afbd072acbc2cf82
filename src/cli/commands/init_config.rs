use anyhow::{bail, Result};
use std::path::PathBuf;

use super::Command;
use crate::config::ServicesCmsConfig;

pub struct InitConfigCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl Command for InitConfigCommand {
    async fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            bail!(
                "{} already exists, use --force to overwrite it",
                self.path.display()
            );
        }
        ServicesCmsConfig::default().save_to_file(&self.path)?;
        println!("✅ Wrote default configuration to {}", self.path.display());
        Ok(())
    }
}
