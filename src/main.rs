use anyhow::Result;
use clap::Parser;

use services_cms::cli::commands::apply::{read_payload, ApplyCommand};
use services_cms::cli::commands::init_config::InitConfigCommand;
use services_cms::cli::commands::replay::ReplayCommand;
use services_cms::cli::commands::show::ShowCommand;
use services_cms::cli::commands::topics::TopicsCommand;
use services_cms::cli::commands::Command;
use services_cms::cli::{Cli, Commands};
use services_cms::{init_telemetry, ServicesCmsConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    ServicesCmsConfig::load_env_file()?;
    let config = ServicesCmsConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            Commands::Apply {
                machine,
                action,
                id,
                payload,
                payload_file,
            } => {
                let payload = read_payload(payload.as_deref(), payload_file.as_deref())?;
                ApplyCommand::new(config, machine, action, id)
                    .with_payload(payload)
                    .execute()
                    .await
            }
            Commands::Show { machine, id } => {
                ShowCommand {
                    config,
                    machine,
                    id,
                }
                .execute()
                .await
            }
            Commands::Topics => TopicsCommand { config }.execute().await,
            Commands::Replay { machine, file } => ReplayCommand { machine, file }.execute().await,
            Commands::InitConfig { path, force } => {
                InitConfigCommand { path, force }.execute().await
            }
        }
    })
}
