use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::types::{DocumentId, DocumentTypeId, GrantId, Operation, UserId, VendorId};
use crate::workflow::{DocumentRecord, VerificationAction, VerificationDecision};

/// What an audited operation acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditTarget {
    Vendor(VendorId),
    Grant(GrantId),
    DocumentType(DocumentTypeId),
    Document(DocumentId),
}

impl fmt::Display for AuditTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditTarget::Vendor(id) => write!(f, "vendor:{}", id),
            AuditTarget::Grant(id) => write!(f, "grant:{}", id),
            AuditTarget::DocumentType(id) => write!(f, "document_type:{}", id),
            AuditTarget::Document(id) => write!(f, "document:{}", id),
        }
    }
}

/// One committed operation, as handed to the audit sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor: UserId,
    pub operation: Operation,
    pub target: AuditTarget,
    pub before: Value,
    pub after: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor: UserId,
        operation: Operation,
        target: AuditTarget,
        before: Value,
        after: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            operation,
            target,
            before,
            after,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Verified,
    Rejected,
    NeedsCorrection,
    Escalated,
    /// A named verifier was assigned the next level
    ReviewAssigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Verified => "verified",
            NotificationKind::Rejected => "rejected",
            NotificationKind::NeedsCorrection => "needs_correction",
            NotificationKind::Escalated => "escalated",
            NotificationKind::ReviewAssigned => "review_assigned",
        }
    }
}

/// A workflow outcome someone should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub document_id: DocumentId,
    pub owner_vendor_id: VendorId,
    pub recipients: Vec<UserId>,
    pub level: u32,
    pub comments: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Derive the event for a committed transition, if it is one that notifies
    pub fn for_transition(
        after: &DocumentRecord,
        decision: Option<&VerificationDecision>,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        use crate::workflow::DocumentStatus;

        let (kind, recipients) = match decision.map(|d| d.action) {
            Some(VerificationAction::Escalated) => {
                (NotificationKind::Escalated, decision.and_then(|d| d.escalated_to_id).into_iter().collect())
            }
            Some(VerificationAction::NeedsCorrection) => (NotificationKind::NeedsCorrection, vec![after.uploaded_by]),
            Some(VerificationAction::Rejected) => (NotificationKind::Rejected, vec![after.uploaded_by]),
            Some(VerificationAction::Approved) if after.status == DocumentStatus::Verified => {
                (NotificationKind::Verified, vec![after.uploaded_by])
            }
            Some(VerificationAction::Approved) => match after.assigned_verifier {
                Some(next) => (NotificationKind::ReviewAssigned, vec![next]),
                None => return None,
            },
            // Scheduler transitions carry no decision
            None => match after.status {
                DocumentStatus::Rejected => (NotificationKind::Rejected, vec![after.uploaded_by]),
                DocumentStatus::Verified => (NotificationKind::Verified, vec![after.uploaded_by]),
                _ => return None,
            },
        };

        Some(Self {
            kind,
            document_id: after.id,
            owner_vendor_id: after.owner_vendor_id,
            recipients,
            level: decision.map_or(after.current_level, |d| d.level),
            comments: decision.and_then(|d| d.comments.clone()),
            timestamp,
        })
    }
}
