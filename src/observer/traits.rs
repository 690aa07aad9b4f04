use async_trait::async_trait;
use std::time::Duration;

use crate::observer::context::{AuditRecord, NotificationEvent};
use crate::observer::error::ObserverError;
use crate::types::Operation;

/// Observer rings. Both run after the state change has committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    Audit = 7,        // Change tracking, compliance logging
    Notification = 9, // Fire-and-forget user notifications
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Ring 7: receives exactly one record per committed operation
#[async_trait]
pub trait AuditObserver: Observer {
    async fn execute(&self, record: &AuditRecord) -> Result<(), ObserverError>;
}

/// Ring 9: receives workflow outcome events
#[async_trait]
pub trait NotificationObserver: Observer {
    async fn execute(&self, event: &NotificationEvent) -> Result<(), ObserverError>;
}

/// Concrete observer types for dynamic dispatch
pub enum ObserverBox {
    Audit(Box<dyn AuditObserver>),
    Notification(Box<dyn NotificationObserver>),
}

impl ObserverBox {
    pub fn name(&self) -> &'static str {
        match self {
            ObserverBox::Audit(o) => o.name(),
            ObserverBox::Notification(o) => o.name(),
        }
    }

    pub fn ring(&self) -> ObserverRing {
        match self {
            ObserverBox::Audit(o) => o.ring(),
            ObserverBox::Notification(o) => o.ring(),
        }
    }

    pub fn applies_to_operation(&self, op: Operation) -> bool {
        match self {
            ObserverBox::Audit(o) => o.applies_to_operation(op),
            ObserverBox::Notification(o) => o.applies_to_operation(op),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ObserverBox::Audit(o) => o.timeout(),
            ObserverBox::Notification(o) => o.timeout(),
        }
    }

    pub async fn execute_audit(&self, record: &AuditRecord) -> Result<(), ObserverError> {
        match self {
            ObserverBox::Audit(o) => o.execute(record).await,
            _ => Ok(()), // Notification observers ignore audit records
        }
    }

    pub async fn execute_notification(&self, event: &NotificationEvent) -> Result<(), ObserverError> {
        match self {
            ObserverBox::Notification(o) => o.execute(event).await,
            _ => Ok(()), // Audit observers ignore notifications
        }
    }
}
