/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Vendor identifier, assigned sequentially by the hierarchy store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub u64);

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier. Users live outside this crate; only their ids flow through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Internal principal used for bootstrap and scheduled transitions
    pub const SYSTEM: UserId = UserId(Uuid::nil());

    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system() {
            write!(f, "system")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentTypeId(pub u64);

impl fmt::Display for DocumentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(pub Uuid);

impl GrantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations that mutate network state.
/// Every successful operation produces exactly one audit record tagged with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    InsertVendor,
    MoveVendor,
    DeleteVendor,
    UpdateVendorStatus,
    AttachAsset,
    DetachAsset,
    GrantPermission,
    RevokePermission,
    RegisterDocumentType,
    UploadDocument,
    ApplyVerification,
    ResubmitDocument,
    ArchiveDocument,
    ExpireCorrection,  // Scheduler: stale needs_correction -> rejected
    ExpireDocument,    // Scheduler: verified past expiry_date -> expired
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::InsertVendor => "insert_vendor",
            Operation::MoveVendor => "move_vendor",
            Operation::DeleteVendor => "delete_vendor",
            Operation::UpdateVendorStatus => "update_vendor_status",
            Operation::AttachAsset => "attach_asset",
            Operation::DetachAsset => "detach_asset",
            Operation::GrantPermission => "grant_permission",
            Operation::RevokePermission => "revoke_permission",
            Operation::RegisterDocumentType => "register_document_type",
            Operation::UploadDocument => "upload_document",
            Operation::ApplyVerification => "apply_verification",
            Operation::ResubmitDocument => "resubmit_document",
            Operation::ArchiveDocument => "archive_document",
            Operation::ExpireCorrection => "expire_correction",
            Operation::ExpireDocument => "expire_document",
        }
    }

    /// True for operations that change the shape or ownership of the vendor tree
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Operation::InsertVendor
                | Operation::MoveVendor
                | Operation::DeleteVendor
                | Operation::UpdateVendorStatus
                | Operation::AttachAsset
                | Operation::DetachAsset
                | Operation::GrantPermission
                | Operation::RevokePermission
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
