use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::Machine;

pub mod commands;

#[derive(Parser)]
#[command(name = "services-cms")]
#[command(about = "Editorial and publication lifecycle engine for services")]
#[command(long_about = "Applies lifecycle actions to services under optimistic concurrency \
                       and emits the work items triggered by each committed change. \
                       Start with 'services-cms init-config' to write a configuration file.")]
pub struct Cli {
    /// Configuration file (defaults to services-cms.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply an action to a service and publish the resulting work items
    Apply {
        /// Machine to drive: lifecycle or publication
        #[arg(value_parser = parse_machine)]
        machine: Machine,
        /// Action name, e.g. create, submit, approve, publish
        action: String,
        /// Service id
        id: String,
        /// JSON payload for the action
        #[arg(long, help = "Inline JSON payload")]
        payload: Option<String>,
        /// Read the JSON payload from a file
        #[arg(long, conflicts_with = "payload", help = "Path to a JSON payload file")]
        payload_file: Option<PathBuf>,
    },
    /// Print the current record of a service
    Show {
        #[arg(value_parser = parse_machine)]
        machine: Machine,
        id: String,
    },
    /// List the service topics reference list
    Topics,
    /// Map a stored record to the work items its watchers emit, without publishing
    Replay {
        #[arg(value_parser = parse_machine)]
        machine: Machine,
        /// Record as printed by `show`
        file: PathBuf,
    },
    /// Write a configuration file with the default settings
    InitConfig {
        /// Destination file
        #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite an existing configuration file")]
        force: bool,
    },
}

fn parse_machine(value: &str) -> Result<Machine, String> {
    value.parse()
}
