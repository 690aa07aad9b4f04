use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::config::{open_network, save_network};
use crate::cli::utils::*;
use crate::cli::CliContext;
use crate::config::config;
use crate::types::{DocumentId, DocumentTypeId, UserId, VendorId};
use crate::workflow::{
    DocumentRecord, DocumentTypeSpec, NewDocument, NewDocumentType, VerificationAction, VerificationRequest,
};

#[derive(Subcommand)]
pub enum DocCommands {
    #[command(about = "Register a document type")]
    TypeAdd {
        #[arg(help = "Unique type code, e.g. vehicle_rc")]
        code: String,

        #[arg(help = "Display name")]
        name: String,

        #[arg(long, default_value_t = 1, help = "Number of sequential verification levels")]
        levels: u32,

        #[arg(long, help = "Verify documents of this type on upload")]
        auto_approve: bool,

        #[arg(long, help = "Documents of this type need no verification")]
        no_verification: bool,

        #[arg(long, help = "Register the type as inactive")]
        inactive: bool,
    },

    #[command(about = "List document types")]
    Types,

    #[command(about = "Upload a document for a vendor")]
    Upload {
        #[arg(help = "Document type id")]
        type_id: u64,

        #[arg(help = "Owner vendor id")]
        vendor: u64,

        #[arg(help = "Document title")]
        title: String,

        #[arg(long, help = "RFC 3339 timestamp after which a verified document expires")]
        expires_at: Option<DateTime<Utc>>,
    },

    #[command(about = "Record a verification decision at a level")]
    Verify {
        #[arg(help = "Document id")]
        id: Uuid,

        #[arg(help = "Verification level (1-based)")]
        level: u32,

        #[arg(help = "approve, reject, needs-correction or escalate")]
        action: VerificationAction,

        #[arg(long, help = "Reviewer comments")]
        comments: Option<String>,

        #[arg(long, help = "Days allowed for a correction (defaults to the configured value)")]
        deadline_days: Option<i64>,

        #[arg(long, help = "User id the level is escalated to")]
        escalate_to: Option<Uuid>,

        #[arg(long, help = "User id expected to act on the next level")]
        next_verifier: Option<Uuid>,

        #[arg(long, help = "Reject the decision if the document version differs")]
        expected_version: Option<u64>,
    },

    #[command(about = "Resubmit a document after a correction request")]
    Resubmit {
        #[arg(help = "Document id")]
        id: Uuid,
    },

    #[command(about = "Archive a document")]
    Archive {
        #[arg(help = "Document id")]
        id: Uuid,
    },

    #[command(about = "Show a document with its decisions")]
    Show {
        #[arg(help = "Document id")]
        id: Uuid,
    },

    #[command(about = "List documents owned by a vendor")]
    List {
        #[arg(help = "Owner vendor id")]
        vendor: u64,
    },

    #[command(about = "Run the correction and document expiry sweeps once")]
    Expire {
        #[arg(long, help = "Sweep as of this RFC 3339 timestamp instead of now")]
        at: Option<DateTime<Utc>>,
    },
}

pub async fn handle(cmd: DocCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let network = open_network(&ctx.state_path, config())?;
    let fmt = &ctx.output_format;

    match cmd {
        DocCommands::TypeAdd {
            code,
            name,
            levels,
            auto_approve,
            no_verification,
            inactive,
        } => {
            let mut request = NewDocumentType::new(code, name, levels);
            request.requires_verification = !no_verification;
            if auto_approve {
                request = request.auto_approved();
            }
            if inactive {
                request = request.inactive();
            }

            let spec = network.register_document_type(ctx.actor, request).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Registered document type {} ({})", spec.id, spec.code),
                Some(json!({ "document_type": spec })),
            )
        }
        DocCommands::Types => {
            let types = network.document_types().await;
            output_list(fmt, "document_types", &types, "No document types", summarize_type)
        }
        DocCommands::Upload {
            type_id,
            vendor,
            title,
            expires_at,
        } => {
            let mut request = NewDocument::new(DocumentTypeId(type_id), VendorId(vendor), title);
            if let Some(at) = expires_at {
                request = request.expiring(at);
            }

            let record = network.upload_document(ctx.actor, request).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Uploaded document {} ({})", record.id, record.status),
                Some(json!({ "document": record })),
            )
        }
        DocCommands::Verify {
            id,
            level,
            action,
            comments,
            deadline_days,
            escalate_to,
            next_verifier,
            expected_version,
        } => {
            let mut request = VerificationRequest::new(level, action);
            if action == VerificationAction::NeedsCorrection {
                let days = deadline_days.unwrap_or(config().workflow.default_correction_days);
                request.correction_deadline = Some(days_after(Utc::now(), days)?);
            }
            request.escalated_to_id = escalate_to.map(UserId);
            if let Some(comments) = comments {
                request = request.with_comments(comments);
            }
            if let Some(verifier) = next_verifier {
                request = request.with_next_verifier(UserId(verifier));
            }

            let record = match expected_version {
                Some(version) => {
                    network
                        .apply_if_version(ctx.actor, DocumentId(id), version, request)
                        .await?
                }
                None => network.apply(ctx.actor, DocumentId(id), request).await?,
            };
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!(
                    "Document {} is {} at level {}/{}",
                    record.id, record.status, record.current_level, record.verification_levels
                ),
                Some(json!({ "document": record })),
            )
        }
        DocCommands::Resubmit { id } => {
            let record = network.resubmit(ctx.actor, DocumentId(id)).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Resubmitted document {} ({})", record.id, record.status),
                Some(json!({ "document": record })),
            )
        }
        DocCommands::Archive { id } => {
            let record = network.archive(ctx.actor, DocumentId(id)).await?;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!("Archived document {}", record.id),
                Some(json!({ "document": record })),
            )
        }
        DocCommands::Show { id } => {
            let entry = network.document(DocumentId(id)).await?;
            output_item(fmt, "document", &entry)
        }
        DocCommands::List { vendor } => {
            let records = network.documents_for_vendor(VendorId(vendor)).await;
            output_list(fmt, "documents", &records, "No documents", summarize_document)
        }
        DocCommands::Expire { at } => {
            let now = at.unwrap_or_else(Utc::now);
            let rejected = network.expire_stale_corrections(now).await;
            let expired = network.expire_documents(now).await;
            save_network(&ctx.state_path, &network).await?;
            output_success(
                fmt,
                &format!(
                    "Rejected {} stale corrections, expired {} documents",
                    rejected.len(),
                    expired.len()
                ),
                Some(json!({
                    "rejected": rejected.iter().map(|r| r.id).collect::<Vec<_>>(),
                    "expired": expired.iter().map(|r| r.id).collect::<Vec<_>>(),
                })),
            )
        }
    }
}

fn summarize_type(spec: &DocumentTypeSpec) -> String {
    let mut line = format!("{} [{}] {} levels={}", spec.id, spec.code, spec.name, spec.verification_levels);
    if spec.skips_review() {
        line.push_str(" auto");
    }
    if !spec.is_active {
        line.push_str(" inactive");
    }
    line
}

fn summarize_document(record: &DocumentRecord) -> String {
    format!(
        "{} {} ({}, level {}/{}, v{})",
        record.id, record.title, record.status, record.current_level, record.verification_levels, record.version
    )
}
