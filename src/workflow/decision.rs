use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NetworkError, NetworkResult};
use crate::types::{DocumentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationAction {
    Approved,
    Rejected,
    NeedsCorrection,
    Escalated,
}

impl VerificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationAction::Approved => "approved",
            VerificationAction::Rejected => "rejected",
            VerificationAction::NeedsCorrection => "needs_correction",
            VerificationAction::Escalated => "escalated",
        }
    }
}

impl fmt::Display for VerificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "approved" | "approve" => Ok(VerificationAction::Approved),
            "rejected" | "reject" => Ok(VerificationAction::Rejected),
            "needs_correction" | "correction" => Ok(VerificationAction::NeedsCorrection),
            "escalated" | "escalate" => Ok(VerificationAction::Escalated),
            other => Err(format!("unknown verification action '{}'", other)),
        }
    }
}

/// The decision recorded for one (document, level) slot. Never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDecision {
    pub document_id: DocumentId,
    pub level: u32,
    pub action: VerificationAction,
    pub verifier_id: UserId,
    pub comments: Option<String>,
    pub correction_deadline: Option<DateTime<Utc>>,
    pub next_verifier_id: Option<UserId>,
    pub escalated_to_id: Option<UserId>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedeReason {
    /// The owner resubmitted after a correction request
    Resubmitted,
    /// The escalatee decided the escalated level
    EscalationResolved,
}

/// A decision that no longer occupies its level slot, kept for history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupersededDecision {
    pub decision: VerificationDecision,
    pub reason: SupersedeReason,
    pub superseded_by: UserId,
    pub superseded_at: DateTime<Utc>,
}

/// Input to `apply`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub level: u32,
    pub action: VerificationAction,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub correction_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_verifier_id: Option<UserId>,
    #[serde(default)]
    pub escalated_to_id: Option<UserId>,
}

impl VerificationRequest {
    pub fn new(level: u32, action: VerificationAction) -> Self {
        Self {
            level,
            action,
            comments: None,
            correction_deadline: None,
            next_verifier_id: None,
            escalated_to_id: None,
        }
    }

    pub fn approve(level: u32) -> Self {
        Self::new(level, VerificationAction::Approved)
    }

    pub fn reject(level: u32) -> Self {
        Self::new(level, VerificationAction::Rejected)
    }

    pub fn needs_correction(level: u32, deadline: DateTime<Utc>) -> Self {
        Self {
            correction_deadline: Some(deadline),
            ..Self::new(level, VerificationAction::NeedsCorrection)
        }
    }

    pub fn escalate(level: u32, to: UserId) -> Self {
        Self {
            escalated_to_id: Some(to),
            ..Self::new(level, VerificationAction::Escalated)
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_next_verifier(mut self, verifier: UserId) -> Self {
        self.next_verifier_id = Some(verifier);
        self
    }

    /// Check the fields each action requires
    pub fn validate(&self, actor: UserId) -> NetworkResult<()> {
        if self.level == 0 {
            return Err(NetworkError::validation("verification levels start at 1"));
        }
        match self.action {
            VerificationAction::NeedsCorrection if self.correction_deadline.is_none() => Err(
                NetworkError::validation("needs_correction requires a correction deadline"),
            ),
            VerificationAction::Escalated => match self.escalated_to_id {
                None => Err(NetworkError::validation("escalation requires a target user")),
                Some(to) if to == actor => Err(NetworkError::validation("cannot escalate to yourself")),
                Some(_) => Ok(()),
            },
            _ => Ok(()),
        }
    }

    pub(crate) fn into_decision(self, document_id: DocumentId, verifier_id: UserId, now: DateTime<Utc>) -> VerificationDecision {
        VerificationDecision {
            document_id,
            level: self.level,
            action: self.action,
            verifier_id,
            comments: self.comments,
            correction_deadline: self.correction_deadline,
            next_verifier_id: self.next_verifier_id,
            escalated_to_id: self.escalated_to_id,
            decided_at: now,
        }
    }
}
