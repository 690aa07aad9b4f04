use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NetworkError, NetworkResult};
use crate::types::{DocumentId, DocumentTypeId, UserId, VendorId};

/// Document type configuration, read-only to the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeSpec {
    pub id: DocumentTypeId,
    pub code: String,
    pub name: String,
    pub verification_levels: u32,
    pub auto_approve: bool,
    pub requires_verification: bool,
    pub is_active: bool,
}

impl DocumentTypeSpec {
    /// Documents of this type are verified on upload
    pub fn skips_review(&self) -> bool {
        self.auto_approve || !self.requires_verification
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocumentType {
    pub code: String,
    pub name: String,
    pub verification_levels: u32,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_true")]
    pub requires_verification: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl NewDocumentType {
    pub fn new(code: impl Into<String>, name: impl Into<String>, verification_levels: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            verification_levels,
            auto_approve: false,
            requires_verification: true,
            is_active: true,
        }
    }

    pub fn auto_approved(mut self) -> Self {
        self.auto_approve = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn into_spec(self, id: DocumentTypeId) -> NetworkResult<DocumentTypeSpec> {
        if self.verification_levels < 1 {
            return Err(NetworkError::validation("verification_levels must be at least 1"));
        }
        if self.code.trim().is_empty() {
            return Err(NetworkError::validation("document type code must not be empty"));
        }
        Ok(DocumentTypeSpec {
            id,
            code: self.code,
            name: self.name,
            verification_levels: self.verification_levels,
            auto_approve: self.auto_approve,
            requires_verification: self.requires_verification,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    UnderReview,
    Verified,
    Rejected,
    Expired,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::UnderReview => "under_review",
            DocumentStatus::Verified => "verified",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Archived => "archived",
        }
    }

    /// No further verification decisions are accepted
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Verified | DocumentStatus::Rejected | DocumentStatus::Expired | DocumentStatus::Archived
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document moving through the verification workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub document_type_id: DocumentTypeId,
    pub owner_vendor_id: VendorId,
    pub title: String,
    pub uploaded_by: UserId,
    pub status: DocumentStatus,
    pub current_level: u32,
    /// Copied from the type at upload
    pub verification_levels: u32,
    /// Who should act on the next level, if anyone was named
    pub assigned_verifier: Option<UserId>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub version: u64,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn next_level(&self) -> u32 {
        self.current_level + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub document_type_id: DocumentTypeId,
    pub owner_vendor_id: VendorId,
    pub title: String,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl NewDocument {
    pub fn new(document_type_id: DocumentTypeId, owner_vendor_id: VendorId, title: impl Into<String>) -> Self {
        Self {
            document_type_id,
            owner_vendor_id,
            title: title.into(),
            expiry_date: None,
        }
    }

    pub fn expiring(mut self, at: DateTime<Utc>) -> Self {
        self.expiry_date = Some(at);
        self
    }
}
