use clap::Args;
use serde_json::json;

use crate::cli::config::save_network;
use crate::cli::utils::*;
use crate::cli::CliContext;
use crate::config::config;
use crate::hierarchy::{NewVendor, VendorType};
use crate::services::VendorNetwork;

#[derive(Args)]
pub struct InitArgs {
    #[arg(long, help = "Overwrite an existing state file")]
    pub force: bool,

    #[arg(long, help = "Name of the root vendor to create")]
    pub root_name: Option<String>,

    #[arg(long, requires = "root_name", help = "Unique code of the root vendor")]
    pub root_code: Option<String>,
}

pub async fn handle(args: InitArgs, ctx: &CliContext) -> anyhow::Result<()> {
    if ctx.state_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "State file {} already exists (use --force to overwrite)",
            ctx.state_path.display()
        ));
    }

    let network = VendorNetwork::new(config().clone());

    let root = match args.root_name {
        Some(name) => {
            let code = args.root_code.unwrap_or_else(|| name.to_ascii_uppercase());
            let root = network
                .insert_root(ctx.actor, NewVendor::new(name, code, VendorType::Super).active())
                .await?;
            Some(root)
        }
        None => None,
    };

    save_network(&ctx.state_path, &network).await?;

    output_success(
        &ctx.output_format,
        &format!("Initialized {}", ctx.state_path.display()),
        Some(json!({
            "state": ctx.state_path.display().to_string(),
            "root": root,
        })),
    )
}
