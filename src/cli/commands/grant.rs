use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::authority::{Authority, NewGrant, PermissionGrant, PERMISSION_CODES};
use crate::cli::config::{open_network, save_network};
use crate::cli::utils::*;
use crate::cli::CliContext;
use crate::config::config;
use crate::types::{GrantId, UserId, VendorId};

#[derive(Subcommand)]
pub enum GrantCommands {
    #[command(about = "Grant a permission code to a user at a vendor")]
    Add {
        #[arg(help = "Vendor id the grant is scoped to")]
        vendor: u64,

        #[arg(help = "User id receiving the grant")]
        user: Uuid,

        #[arg(help = "Permission code, e.g. verify_document")]
        code: String,

        #[arg(long, help = "Allow the grantee to delegate this code further")]
        can_delegate: bool,

        #[arg(long, help = "Create a delegated grant backed by the actor's own delegable grant")]
        delegated: bool,

        #[arg(long, conflicts_with = "expires_at", help = "Expire the grant after this many days")]
        expires_in_days: Option<i64>,

        #[arg(long, help = "Expire the grant at this RFC 3339 timestamp")]
        expires_at: Option<DateTime<Utc>>,
    },

    #[command(about = "Revoke a grant by id")]
    Revoke {
        #[arg(help = "Grant id")]
        id: Uuid,
    },

    #[command(about = "List grants, optionally for one vendor or user")]
    List {
        #[arg(long, help = "Only grants scoped to this vendor")]
        vendor: Option<u64>,

        #[arg(long, help = "Only grants held by this user")]
        user: Option<Uuid>,
    },

    #[command(about = "Resolve a code for a user, or list their effective codes")]
    Check {
        #[arg(help = "User id")]
        user: Uuid,

        #[arg(help = "Vendor id")]
        vendor: u64,

        #[arg(help = "Permission code; omit to list every effective code")]
        code: Option<String>,
    },
}

pub async fn handle(cmd: GrantCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let network = open_network(&ctx.state_path, config())?;
    let fmt = &ctx.output_format;

    match cmd {
        GrantCommands::Add {
            vendor,
            user,
            code,
            can_delegate,
            delegated,
            expires_in_days,
            expires_at,
        } => {
            if !PERMISSION_CODES.contains(&code.as_str()) {
                tracing::warn!("'{}' is not a built-in permission code", code);
            }
            let mut request = if delegated {
                NewGrant::delegated(VendorId(vendor), UserId(user), code)
            } else {
                NewGrant::organizational(VendorId(vendor), UserId(user), code)
            };
            if can_delegate {
                request = request.delegable();
            }
            let expiry = match (expires_at, expires_in_days) {
                (Some(at), _) => Some(at),
                (None, Some(days)) => Some(days_after(Utc::now(), days)?),
                (None, None) => None,
            };
            if let Some(at) = expiry {
                request = request.expiring(at);
            }

            let grant = network.grant_permission(ctx.actor, request).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!(
                    "Granted {} to {} at vendor {} (grant {})",
                    grant.permission_code, grant.user_id, grant.vendor_id, grant.id
                ),
                Some(json!({ "grant": grant })),
            )
        }
        GrantCommands::Revoke { id } => {
            let grant = network.revoke_permission(ctx.actor, GrantId(id)).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Revoked {} from {} at vendor {}", grant.permission_code, grant.user_id, grant.vendor_id),
                Some(json!({ "grant": grant })),
            )
        }
        GrantCommands::List { vendor, user } => {
            let grants: Vec<PermissionGrant> = match vendor {
                Some(vendor) => network.grants_for_vendor(VendorId(vendor)).await,
                None => network.grants().await,
            }
            .into_iter()
            .filter(|g| user.map_or(true, |u| g.user_id == UserId(u)))
            .collect();
            output_list(fmt, "grants", &grants, "No grants", summarize)
        }
        GrantCommands::Check { user, vendor, code: Some(code) } => {
            let authority = network.resolve(UserId(user), VendorId(vendor), &code).await?;
            match &authority {
                Authority::Granted { scope, .. } => output_success(
                    fmt,
                    &format!("{} holds {} at vendor {} (granted at {})", user, code, vendor, scope),
                    Some(json!({ "authority": authority })),
                ),
                Authority::Denied { reason } => output_success(
                    fmt,
                    &format!("{} is denied {} at vendor {}: {}", user, code, vendor, reason),
                    Some(json!({ "authority": authority })),
                ),
            }
        }
        GrantCommands::Check { user, vendor, code: None } => {
            let codes = network.effective_permissions(UserId(user), VendorId(vendor)).await?;
            output_list(fmt, "permissions", &codes, "No effective permissions", |c| c.clone())
        }
    }
}

fn summarize(grant: &PermissionGrant) -> String {
    let mut line = format!(
        "{} vendor={} user={} code={}",
        grant.id, grant.vendor_id, grant.user_id, grant.permission_code
    );
    if grant.can_delegate {
        line.push_str(" +delegate");
    }
    if let Some(at) = grant.expires_at {
        line.push_str(&format!(" expires={}", at.to_rfc3339()));
    }
    line
}
