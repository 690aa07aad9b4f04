// Core error taxonomy shared by the hierarchy, authority and workflow layers
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::authority::PermissionGrant;
use crate::hierarchy::VendorNode;
use crate::types::{DocumentId, VendorId};
use crate::workflow::DocumentRecord;

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Result type returned by the `VendorNetwork` service surface
pub type ServiceResult<T> = Result<T, Rejection>;

/// Why an authority check came back `Denied`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoGrant,
    Expired,
    DelegationNotAllowed,
    /// Level was escalated to another user
    NotAssignee,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::NoGrant => "no_grant",
            DenialReason::Expired => "expired",
            DenialReason::DelegationNotAllowed => "delegation_not_allowed",
            DenialReason::NotAssignee => "not_assignee",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Capacity exceeded: vendor {vendor_id} allows at most {limit} {resource}")]
    CapacityExceeded {
        vendor_id: VendorId,
        resource: String,
        limit: u32,
    },

    #[error("Cycle: vendor {new_parent_id} is vendor {node_id} or one of its descendants")]
    Cycle {
        node_id: VendorId,
        new_parent_id: VendorId,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not empty: vendor {vendor_id} has {active_descendants} active descendants and {owned_records} owned records")]
    NotEmpty {
        vendor_id: VendorId,
        active_descendants: usize,
        owned_records: usize,
    },

    #[error("Authority denied: {reason}")]
    AuthorityDenied { reason: DenialReason },

    #[error("Verification conflict: document {document_id} level {level} already has a decision or a newer version")]
    VerificationConflict { document_id: DocumentId, level: u32 },

    #[error("Out of order: expected level {expected}, got level {requested}")]
    OutOfOrder { expected: u32, requested: u32 },

    #[error("Hierarchy invariant violated: {0}")]
    HierarchyInvariantViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl NetworkError {
    pub fn not_found(message: impl Into<String>) -> Self {
        NetworkError::NotFound(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        NetworkError::InvalidOperation(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        NetworkError::Validation(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        NetworkError::HierarchyInvariantViolation(message.into())
    }

    pub fn denied(reason: DenialReason) -> Self {
        NetworkError::AuthorityDenied { reason }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::NotFound(_) => "NOT_FOUND",
            NetworkError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            NetworkError::Cycle { .. } => "CYCLE_ERROR",
            NetworkError::InvalidOperation(_) => "INVALID_OPERATION",
            NetworkError::NotEmpty { .. } => "NOT_EMPTY",
            NetworkError::AuthorityDenied { .. } => "AUTHORITY_DENIED",
            NetworkError::VerificationConflict { .. } => "VERIFICATION_CONFLICT",
            NetworkError::OutOfOrder { .. } => "OUT_OF_ORDER",
            NetworkError::HierarchyInvariantViolation(_) => "HIERARCHY_INVARIANT_VIOLATION",
            NetworkError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Structural violations abort the whole transaction
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NetworkError::Cycle { .. }
                | NetworkError::HierarchyInvariantViolation(_)
                | NetworkError::NotEmpty { .. }
        )
    }

    /// Caller should re-fetch current state and may try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetworkError::AuthorityDenied { .. }
                | NetworkError::VerificationConflict { .. }
                | NetworkError::OutOfOrder { .. }
        )
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": true,
            "message": self.to_string(),
            "code": self.error_code(),
        });

        match self {
            NetworkError::AuthorityDenied { reason } => {
                body["reason"] = json!(reason);
            }
            NetworkError::OutOfOrder { expected, requested } => {
                body["expected_level"] = json!(expected);
                body["requested_level"] = json!(requested);
            }
            NetworkError::VerificationConflict { document_id, level } => {
                body["document_id"] = json!(document_id);
                body["level"] = json!(level);
            }
            _ => {}
        }

        body
    }
}

/// Authoritative state of the target of a rejected operation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum CurrentState {
    Vendor(VendorNode),
    Document(DocumentRecord),
    Grant(PermissionGrant),
}

/// A rejected request: the specific error kind plus the current state of its target,
/// so the caller can decide whether to retry.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct Rejection {
    pub error: NetworkError,
    pub current: Option<CurrentState>,
}

impl Rejection {
    pub fn new(error: NetworkError) -> Self {
        Self { error, current: None }
    }

    pub fn with_current(mut self, current: Option<CurrentState>) -> Self {
        self.current = current;
        self
    }

    pub fn document(&self) -> Option<&DocumentRecord> {
        match &self.current {
            Some(CurrentState::Document(doc)) => Some(doc),
            _ => None,
        }
    }

    pub fn vendor(&self) -> Option<&VendorNode> {
        match &self.current {
            Some(CurrentState::Vendor(node)) => Some(node),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = self.error.to_json();
        if let Some(current) = &self.current {
            body["current"] = serde_json::to_value(current).unwrap_or(Value::Null);
        }
        body
    }
}

impl From<NetworkError> for Rejection {
    fn from(error: NetworkError) -> Self {
        Rejection::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(NetworkError::not_found("vendor 9").error_code(), "NOT_FOUND");
        assert_eq!(
            NetworkError::Cycle { node_id: VendorId(1), new_parent_id: VendorId(2) }.error_code(),
            "CYCLE_ERROR"
        );
        assert_eq!(NetworkError::denied(DenialReason::Expired).error_code(), "AUTHORITY_DENIED");
    }

    #[test]
    fn ordering_errors_are_retryable_structural_are_not() {
        assert!(NetworkError::OutOfOrder { expected: 1, requested: 2 }.is_retryable());
        assert!(!NetworkError::invariant("broken").is_retryable());
        assert!(NetworkError::invariant("broken").is_structural());
    }

    #[test]
    fn denial_json_carries_reason() {
        let body = NetworkError::denied(DenialReason::DelegationNotAllowed).to_json();
        assert_eq!(body["code"], "AUTHORITY_DENIED");
        assert_eq!(body["reason"], "delegation_not_allowed");
    }
}
