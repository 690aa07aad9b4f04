use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{open_network, save_network};
use crate::cli::utils::*;
use crate::cli::CliContext;
use crate::config::config;
use crate::hierarchy::{AssetKind, Capacity, NewVendor, VendorNode, VendorStatus, VendorType};
use crate::types::VendorId;

#[derive(Subcommand)]
pub enum VendorCommands {
    #[command(about = "List every vendor in pre-order")]
    List,

    #[command(about = "Show one vendor with its asset counts")]
    Show {
        #[arg(help = "Vendor id")]
        id: u64,
    },

    #[command(about = "Insert a vendor as the last child of a parent")]
    Insert {
        #[arg(help = "Parent vendor id")]
        parent: u64,

        #[arg(help = "Vendor name")]
        name: String,

        #[arg(help = "Unique vendor code")]
        code: String,

        #[arg(long = "type", default_value = "local", help = "super, regional, city or local")]
        vendor_type: VendorType,

        #[arg(long, help = "Initial status (pending unless given)")]
        status: Option<VendorStatus>,

        #[arg(long, help = "Maximum direct active sub-vendors")]
        max_sub_vendors: Option<u32>,

        #[arg(long, help = "Maximum attached drivers")]
        max_drivers: Option<u32>,

        #[arg(long, help = "Maximum attached vehicles")]
        max_vehicles: Option<u32>,
    },

    #[command(about = "Move a vendor and its subtree under a new parent")]
    Move {
        #[arg(help = "Vendor id to move")]
        id: u64,

        #[arg(help = "New parent vendor id")]
        parent: u64,
    },

    #[command(about = "Delete a vendor and its subtree")]
    Delete {
        #[arg(help = "Vendor id")]
        id: u64,

        #[arg(long, help = "Delete even with active descendants or owned records")]
        force: bool,
    },

    #[command(about = "Change a vendor's status")]
    Status {
        #[arg(help = "Vendor id")]
        id: u64,

        #[arg(help = "active, inactive, suspended or pending")]
        status: VendorStatus,
    },

    #[command(about = "List ancestors from the root down")]
    Ancestors {
        #[arg(help = "Vendor id")]
        id: u64,
    },

    #[command(about = "List all descendants in pre-order")]
    Descendants {
        #[arg(help = "Vendor id")]
        id: u64,
    },

    #[command(about = "List direct children")]
    Children {
        #[arg(help = "Vendor id")]
        id: u64,
    },

    #[command(about = "Attach one driver or vehicle to a vendor")]
    Attach {
        #[arg(help = "Vendor id")]
        id: u64,

        #[arg(help = "driver or vehicle")]
        kind: AssetKind,
    },

    #[command(about = "Detach one driver or vehicle from a vendor")]
    Detach {
        #[arg(help = "Vendor id")]
        id: u64,

        #[arg(help = "driver or vehicle")]
        kind: AssetKind,
    },
}

pub async fn handle(cmd: VendorCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let network = open_network(&ctx.state_path, config())?;
    let fmt = &ctx.output_format;

    match cmd {
        VendorCommands::List => {
            let vendors = network.vendors().await;
            output_list(fmt, "vendors", &vendors, "No vendors", summarize)
        }
        VendorCommands::Show { id } => {
            let vendor = network.vendor(VendorId(id)).await?;
            let assets = network.assets(VendorId(id)).await?;
            output_item(fmt, "vendor", &json!({ "vendor": vendor, "assets": assets }))
        }
        VendorCommands::Insert {
            parent,
            name,
            code,
            vendor_type,
            status,
            max_sub_vendors,
            max_drivers,
            max_vehicles,
        } => {
            let mut attrs = NewVendor::new(name, code, vendor_type);
            if let Some(status) = status {
                attrs = attrs.with_status(status);
            }
            if max_sub_vendors.is_some() || max_drivers.is_some() || max_vehicles.is_some() {
                let defaults = config().hierarchy.default_capacity();
                attrs = attrs.with_capacity(Capacity {
                    max_sub_vendors: max_sub_vendors.unwrap_or(defaults.max_sub_vendors),
                    max_drivers: max_drivers.unwrap_or(defaults.max_drivers),
                    max_vehicles: max_vehicles.unwrap_or(defaults.max_vehicles),
                });
            }

            let vendor = network.insert_vendor(ctx.actor, VendorId(parent), attrs).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Inserted vendor {} ({}) under {}", vendor.id, vendor.code, parent),
                Some(json!({ "vendor": vendor })),
            )
        }
        VendorCommands::Move { id, parent } => {
            let vendor = network.move_vendor(ctx.actor, VendorId(id), VendorId(parent)).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Moved vendor {} under {}", id, parent),
                Some(json!({ "vendor": vendor })),
            )
        }
        VendorCommands::Delete { id, force } => {
            let outcome = network.delete_vendor(ctx.actor, VendorId(id), force).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!(
                    "Deleted {} vendors, revoked {} grants, archived {} documents",
                    outcome.removed.len(),
                    outcome.revoked_grants.len(),
                    outcome.archived_documents.len()
                ),
                Some(json!({ "outcome": outcome })),
            )
        }
        VendorCommands::Status { id, status } => {
            let vendor = network.update_vendor_status(ctx.actor, VendorId(id), status).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Vendor {} is now {}", id, vendor.status),
                Some(json!({ "vendor": vendor })),
            )
        }
        VendorCommands::Ancestors { id } => {
            let ancestors = network.ancestors(VendorId(id)).await?;
            output_list(fmt, "ancestors", &ancestors, "Vendor is the root", summarize)
        }
        VendorCommands::Descendants { id } => {
            let descendants = network.descendants(VendorId(id)).await?;
            output_list(fmt, "descendants", &descendants, "No descendants", summarize)
        }
        VendorCommands::Children { id } => {
            let children = network.children(VendorId(id)).await?;
            output_list(fmt, "children", &children, "No children", summarize)
        }
        VendorCommands::Attach { id, kind } => {
            let counts = network.attach_asset(ctx.actor, VendorId(id), kind).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Vendor {} now has {} {}", id, counts.get(kind), kind.as_str()),
                Some(json!({ "assets": counts })),
            )
        }
        VendorCommands::Detach { id, kind } => {
            let counts = network.detach_asset(ctx.actor, VendorId(id), kind).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Vendor {} now has {} {}", id, counts.get(kind), kind.as_str()),
                Some(json!({ "assets": counts })),
            )
        }
    }
}

fn summarize(vendor: &VendorNode) -> String {
    format!(
        "{}{} [{}] {} ({}, {})",
        "  ".repeat(vendor.level as usize),
        vendor.id,
        vendor.code,
        vendor.name,
        vendor.vendor_type.as_str(),
        vendor.status
    )
}
