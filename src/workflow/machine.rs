// Per-document verification state machine
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DenialReason, NetworkError, NetworkResult};
use crate::types::{DocumentId, UserId};
use crate::workflow::decision::{
    SupersedeReason, SupersededDecision, VerificationAction, VerificationDecision, VerificationRequest,
};
use crate::workflow::document::{DocumentRecord, DocumentStatus, DocumentTypeSpec, NewDocument};

/// Result of a committed transition, consumed by the audit and notification observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub before: DocumentRecord,
    pub after: DocumentRecord,
    pub decision: Option<VerificationDecision>,
}

/// A document together with its decision slots and decision history.
///
/// Callers serialize access per document; everything here assumes exclusive
/// `&mut self` and either commits the whole transition or returns an error
/// with the entry untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub record: DocumentRecord,
    /// At most one live decision per level
    pub decisions: BTreeMap<u32, VerificationDecision>,
    pub superseded: Vec<SupersededDecision>,
}

impl DocumentEntry {
    /// Create the entry for a fresh upload. Types that skip review are verified immediately.
    pub fn upload(
        id: DocumentId,
        spec: &DocumentTypeSpec,
        new: NewDocument,
        uploaded_by: UserId,
        now: DateTime<Utc>,
    ) -> NetworkResult<Self> {
        if !spec.is_active {
            return Err(NetworkError::invalid_operation(format!(
                "document type '{}' is not active",
                spec.code
            )));
        }
        if new.document_type_id != spec.id {
            return Err(NetworkError::validation("document type does not match the upload"));
        }

        let (status, current_level) = if spec.skips_review() {
            (DocumentStatus::Verified, spec.verification_levels)
        } else {
            (DocumentStatus::Uploaded, 0)
        };

        Ok(Self {
            record: DocumentRecord {
                id,
                document_type_id: spec.id,
                owner_vendor_id: new.owner_vendor_id,
                title: new.title,
                uploaded_by,
                status,
                current_level,
                verification_levels: spec.verification_levels,
                assigned_verifier: None,
                expiry_date: new.expiry_date,
                version: 1,
                uploaded_at: now,
                updated_at: now,
            },
            decisions: BTreeMap::new(),
            superseded: Vec::new(),
        })
    }

    pub fn id(&self) -> DocumentId {
        self.record.id
    }

    /// The correction request blocking the next level, if any
    pub fn outstanding_correction(&self) -> Option<&VerificationDecision> {
        if self.record.status != DocumentStatus::Uploaded {
            return None;
        }
        self.decisions
            .get(&self.record.next_level())
            .filter(|d| d.action == VerificationAction::NeedsCorrection)
    }

    /// User an escalated level is restricted to
    pub fn escalated_to(&self, level: u32) -> Option<UserId> {
        self.decisions
            .get(&level)
            .filter(|d| d.action == VerificationAction::Escalated)
            .and_then(|d| d.escalated_to_id)
    }

    /// Record a verification decision. Authority over the owner vendor is
    /// checked by the caller before this runs.
    pub fn apply(
        &mut self,
        actor: UserId,
        request: VerificationRequest,
        now: DateTime<Utc>,
    ) -> NetworkResult<Transition> {
        request.validate(actor)?;
        let level = request.level;

        // Slot check first so a lost race surfaces as a conflict, not a terminal-state error
        if let Some(existing) = self.decisions.get(&level) {
            let open_escalation =
                existing.action == VerificationAction::Escalated && !self.record.status.is_terminal();
            if !open_escalation {
                return Err(NetworkError::VerificationConflict {
                    document_id: self.record.id,
                    level,
                });
            }
            if existing.escalated_to_id != Some(actor) {
                return Err(NetworkError::denied(DenialReason::NotAssignee));
            }
        }

        if self.record.status.is_terminal() {
            return Err(NetworkError::invalid_operation(format!(
                "document {} is {}",
                self.record.id, self.record.status
            )));
        }

        let expected = self.record.next_level();
        if level != expected {
            return Err(NetworkError::OutOfOrder {
                expected,
                requested: level,
            });
        }

        let before = self.record.clone();
        if let Some(previous) = self.decisions.remove(&level) {
            self.superseded.push(SupersededDecision {
                decision: previous,
                reason: SupersedeReason::EscalationResolved,
                superseded_by: actor,
                superseded_at: now,
            });
        }

        let decision = request.into_decision(self.record.id, actor, now);
        let record = &mut self.record;
        match decision.action {
            VerificationAction::Approved => {
                if level >= record.verification_levels {
                    record.status = DocumentStatus::Verified;
                    record.current_level = record.verification_levels;
                    record.assigned_verifier = None;
                } else {
                    record.status = DocumentStatus::UnderReview;
                    record.current_level = level;
                    record.assigned_verifier = decision.next_verifier_id;
                }
            }
            VerificationAction::Rejected => {
                record.status = DocumentStatus::Rejected;
                record.assigned_verifier = None;
            }
            VerificationAction::NeedsCorrection => {
                record.status = DocumentStatus::Uploaded;
                record.assigned_verifier = None;
            }
            VerificationAction::Escalated => {
                record.status = DocumentStatus::UnderReview;
                record.assigned_verifier = decision.escalated_to_id;
            }
        }
        record.version += 1;
        record.updated_at = now;

        self.decisions.insert(level, decision.clone());
        Ok(Transition {
            before,
            after: self.record.clone(),
            decision: Some(decision),
        })
    }

    /// `apply` guarded by the caller's view of the document version
    pub fn apply_if_version(
        &mut self,
        expected_version: u64,
        actor: UserId,
        request: VerificationRequest,
        now: DateTime<Utc>,
    ) -> NetworkResult<Transition> {
        if self.record.version != expected_version {
            return Err(NetworkError::VerificationConflict {
                document_id: self.record.id,
                level: request.level,
            });
        }
        self.apply(actor, request, now)
    }

    /// Clear the outstanding correction so the flagged level can be decided again.
    /// Approvals below that level stand.
    pub fn resubmit(&mut self, actor: UserId, now: DateTime<Utc>) -> NetworkResult<Transition> {
        let deadline = match self.outstanding_correction() {
            Some(correction) => correction.correction_deadline,
            None => {
                return Err(NetworkError::invalid_operation(format!(
                    "document {} has no outstanding correction request",
                    self.record.id
                )))
            }
        };
        if deadline.map_or(false, |d| d < now) {
            return Err(NetworkError::invalid_operation(format!(
                "correction deadline for document {} has passed",
                self.record.id
            )));
        }

        let before = self.record.clone();
        let level = self.record.next_level();
        if let Some(correction) = self.decisions.remove(&level) {
            self.superseded.push(SupersededDecision {
                decision: correction,
                reason: SupersedeReason::Resubmitted,
                superseded_by: actor,
                superseded_at: now,
            });
        }

        self.record.status = if self.record.current_level == 0 {
            DocumentStatus::Uploaded
        } else {
            DocumentStatus::UnderReview
        };
        self.record.version += 1;
        self.record.updated_at = now;

        Ok(Transition {
            before,
            after: self.record.clone(),
            decision: None,
        })
    }

    pub fn archive(&mut self, now: DateTime<Utc>) -> NetworkResult<Transition> {
        if self.record.status == DocumentStatus::Archived {
            return Err(NetworkError::invalid_operation(format!(
                "document {} is already archived",
                self.record.id
            )));
        }
        Ok(self.force_status(DocumentStatus::Archived, now))
    }

    /// Reject a document whose correction deadline passed without resubmission.
    /// Returns `None` when there is nothing to expire.
    pub fn expire_correction(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        let stale = self
            .outstanding_correction()
            .and_then(|d| d.correction_deadline)
            .map_or(false, |deadline| deadline < now);
        stale.then(|| self.force_status(DocumentStatus::Rejected, now))
    }

    /// Expire a verified document past its expiry date
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        let due = self.record.status == DocumentStatus::Verified
            && self.record.expiry_date.map_or(false, |at| at < now);
        due.then(|| self.force_status(DocumentStatus::Expired, now))
    }

    fn force_status(&mut self, status: DocumentStatus, now: DateTime<Utc>) -> Transition {
        let before = self.record.clone();
        self.record.status = status;
        self.record.assigned_verifier = None;
        self.record.version += 1;
        self.record.updated_at = now;
        Transition {
            before,
            after: self.record.clone(),
            decision: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentTypeId, VendorId};
    use crate::workflow::document::NewDocumentType;
    use chrono::Duration;

    fn entry(levels: u32) -> DocumentEntry {
        let spec = NewDocumentType::new("license", "Licence", levels)
            .into_spec(DocumentTypeId(1))
            .unwrap();
        DocumentEntry::upload(
            DocumentId::new(),
            &spec,
            NewDocument::new(DocumentTypeId(1), VendorId(1), "licence.pdf"),
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_three_levels_in_order() {
        let mut doc = entry(3);
        let actor = UserId::new();
        let now = Utc::now();

        let err = doc.apply(actor, VerificationRequest::approve(2), now).unwrap_err();
        assert_eq!(err, NetworkError::OutOfOrder { expected: 1, requested: 2 });

        doc.apply(actor, VerificationRequest::approve(1), now).unwrap();
        assert_eq!(doc.record.status, DocumentStatus::UnderReview);
        assert_eq!(doc.record.current_level, 1);
        doc.apply(actor, VerificationRequest::approve(2), now).unwrap();
        assert_eq!(doc.record.status, DocumentStatus::UnderReview);
        let t = doc.apply(actor, VerificationRequest::approve(3), now).unwrap();
        assert_eq!(t.after.status, DocumentStatus::Verified);
        assert_eq!(t.after.current_level, 3);
        assert_eq!(doc.decisions.len(), 3);
        assert_eq!(doc.record.version, 4);
    }

    #[test]
    fn test_second_decision_at_level_conflicts() {
        let mut doc = entry(2);
        let now = Utc::now();
        doc.apply(UserId::new(), VerificationRequest::approve(1), now).unwrap();
        let err = doc.apply(UserId::new(), VerificationRequest::approve(1), now).unwrap_err();
        assert!(matches!(err, NetworkError::VerificationConflict { level: 1, .. }));
    }

    #[test]
    fn test_rejection_is_terminal() {
        let mut doc = entry(3);
        let now = Utc::now();
        doc.apply(UserId::new(), VerificationRequest::approve(1), now).unwrap();
        doc.apply(UserId::new(), VerificationRequest::reject(2), now).unwrap();
        assert_eq!(doc.record.status, DocumentStatus::Rejected);
        let err = doc.apply(UserId::new(), VerificationRequest::approve(3), now).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidOperation(_)));
    }

    #[test]
    fn test_correction_then_resubmit_keeps_lower_levels() {
        let mut doc = entry(3);
        let now = Utc::now();
        doc.apply(UserId::new(), VerificationRequest::approve(1), now).unwrap();
        doc.apply(UserId::new(), VerificationRequest::needs_correction(2, now + Duration::days(3)), now)
            .unwrap();
        assert_eq!(doc.record.status, DocumentStatus::Uploaded);
        assert_eq!(doc.record.current_level, 1);
        assert!(doc.outstanding_correction().is_some());

        doc.resubmit(doc.record.uploaded_by, now).unwrap();
        assert_eq!(doc.record.status, DocumentStatus::UnderReview);
        assert_eq!(doc.record.current_level, 1);
        assert!(doc.decisions.contains_key(&1));
        assert!(!doc.decisions.contains_key(&2));
        assert_eq!(doc.superseded.len(), 1);
        assert_eq!(doc.superseded[0].reason, SupersedeReason::Resubmitted);

        doc.apply(UserId::new(), VerificationRequest::approve(2), now).unwrap();
        assert_eq!(doc.record.current_level, 2);
    }

    #[test]
    fn test_correction_expiry_is_idempotent() {
        let mut doc = entry(1);
        let now = Utc::now();
        let deadline = now + Duration::days(1);
        doc.apply(UserId::new(), VerificationRequest::needs_correction(1, deadline), now).unwrap();

        assert!(doc.expire_correction(deadline - Duration::seconds(1)).is_none());
        assert_eq!(doc.record.status, DocumentStatus::Uploaded);

        let t = doc.expire_correction(deadline + Duration::seconds(1)).unwrap();
        assert_eq!(t.after.status, DocumentStatus::Rejected);
        assert!(doc.expire_correction(deadline + Duration::days(1)).is_none());
    }

    #[test]
    fn test_resubmit_after_deadline_refused() {
        let mut doc = entry(1);
        let now = Utc::now();
        doc.apply(UserId::new(), VerificationRequest::needs_correction(1, now + Duration::hours(1)), now)
            .unwrap();
        let err = doc.resubmit(UserId::new(), now + Duration::hours(2)).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidOperation(_)));
    }

    #[test]
    fn test_escalation_restricts_level_to_escalatee() {
        let mut doc = entry(2);
        let now = Utc::now();
        let senior = UserId::new();
        doc.apply(UserId::new(), VerificationRequest::escalate(1, senior), now).unwrap();
        assert_eq!(doc.record.status, DocumentStatus::UnderReview);
        assert_eq!(doc.record.current_level, 0);
        assert_eq!(doc.record.assigned_verifier, Some(senior));

        let err = doc.apply(UserId::new(), VerificationRequest::approve(1), now).unwrap_err();
        assert_eq!(err, NetworkError::denied(DenialReason::NotAssignee));

        doc.apply(senior, VerificationRequest::approve(1), now).unwrap();
        assert_eq!(doc.record.current_level, 1);
        assert_eq!(doc.decisions[&1].verifier_id, senior);
        assert_eq!(doc.superseded[0].reason, SupersedeReason::EscalationResolved);
    }

    #[test]
    fn test_next_verifier_assigned() {
        let mut doc = entry(2);
        let next = UserId::new();
        doc.apply(UserId::new(), VerificationRequest::approve(1).with_next_verifier(next), Utc::now())
            .unwrap();
        assert_eq!(doc.record.assigned_verifier, Some(next));
    }

    #[test]
    fn test_stale_version_conflicts() {
        let mut doc = entry(2);
        let now = Utc::now();
        let seen = doc.record.version;
        doc.apply(UserId::new(), VerificationRequest::approve(1), now).unwrap();
        let err = doc
            .apply_if_version(seen, UserId::new(), VerificationRequest::approve(2), now)
            .unwrap_err();
        assert!(matches!(err, NetworkError::VerificationConflict { level: 2, .. }));
    }

    #[test]
    fn test_auto_approve_verified_on_upload() {
        let spec = NewDocumentType::new("photo", "Photo", 2)
            .auto_approved()
            .into_spec(DocumentTypeId(7))
            .unwrap();
        let doc = DocumentEntry::upload(
            DocumentId::new(),
            &spec,
            NewDocument::new(DocumentTypeId(7), VendorId(1), "me.jpg"),
            UserId::new(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(doc.record.status, DocumentStatus::Verified);
        assert_eq!(doc.record.current_level, 2);
    }

    #[test]
    fn test_document_expiry() {
        let now = Utc::now();
        let spec = NewDocumentType::new("photo", "Photo", 1)
            .auto_approved()
            .into_spec(DocumentTypeId(7))
            .unwrap();
        let mut doc = DocumentEntry::upload(
            DocumentId::new(),
            &spec,
            NewDocument::new(DocumentTypeId(7), VendorId(1), "me.jpg").expiring(now + Duration::days(30)),
            UserId::new(),
            now,
        )
        .unwrap();
        assert!(doc.expire(now).is_none());
        assert_eq!(doc.expire(now + Duration::days(31)).unwrap().after.status, DocumentStatus::Expired);
        assert!(doc.expire(now + Duration::days(32)).is_none());
    }
}
