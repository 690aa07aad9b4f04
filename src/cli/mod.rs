pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::types::UserId;

#[derive(Parser)]
#[command(name = "vendornet")]
#[command(about = "Vendornet CLI - vendor hierarchy and document verification over a local state file")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "State file (.yaml or .json); defaults to $VENDORNET_STATE or ./vendornet.yaml")]
    pub state: Option<PathBuf>,

    #[arg(long, global = true, help = "Act as this user id instead of the system principal")]
    pub actor: Option<Uuid>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create a new state file, optionally with a root vendor")]
    Init(commands::init::InitArgs),

    #[command(about = "Vendor hierarchy queries and mutations")]
    Vendor {
        #[command(subcommand)]
        cmd: commands::vendor::VendorCommands,
    },

    #[command(about = "Permission grant management and authority checks")]
    Grant {
        #[command(subcommand)]
        cmd: commands::grant::GrantCommands,
    },

    #[command(about = "Document types, uploads and verification decisions")]
    Doc {
        #[command(subcommand)]
        cmd: commands::doc::DocCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Per-invocation settings shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    pub state_path: PathBuf,
    pub actor: UserId,
    pub output_format: OutputFormat,
}

impl CliContext {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            state_path: cli.state.clone().unwrap_or_else(config::default_state_path),
            actor: cli.actor.map(UserId).unwrap_or(UserId::SYSTEM),
            output_format: OutputFormat::from_cli(cli),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::from_cli(&cli);

    match cli.command {
        Commands::Init(args) => commands::init::handle(args, &ctx).await,
        Commands::Vendor { cmd } => commands::vendor::handle(cmd, &ctx).await,
        Commands::Grant { cmd } => commands::grant::handle(cmd, &ctx).await,
        Commands::Doc { cmd } => commands::doc::handle(cmd, &ctx).await,
    }
}
