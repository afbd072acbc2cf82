use anyhow::{bail, Result};
use serde_json::Value;

use crate::api::ApiResponse;

pub mod apply;
pub mod init_config;
pub mod replay;
pub mod show;
pub mod topics;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Print a response body and turn non-success statuses into an error
pub fn report(response: &ApiResponse) -> Result<()> {
    if let Some(body) = &response.body {
        println!("{}", pretty(body));
    }
    if !response.is_success() {
        bail!("request failed with status {}", response.status);
    }
    Ok(())
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
