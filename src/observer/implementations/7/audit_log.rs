// Ring 7: Audit sinks - structured log output and an in-memory append-only log
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::observer::context::AuditRecord;
use crate::observer::error::ObserverError;
use crate::observer::traits::{AuditObserver, Observer, ObserverRing};

/// Ring 7: writes every audit record as a structured event on the `vendornet::audit` target
#[derive(Default)]
pub struct TracingAuditObserver;

impl Observer for TracingAuditObserver {
    fn name(&self) -> &'static str {
        "TracingAuditObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }
}

#[async_trait]
impl AuditObserver for TracingAuditObserver {
    async fn execute(&self, record: &AuditRecord) -> Result<(), ObserverError> {
        let before = serde_json::to_string(&record.before)
            .map_err(|e| ObserverError::SinkError(format!("Failed to encode audit before-state: {}", e)))?;
        let after = serde_json::to_string(&record.after)
            .map_err(|e| ObserverError::SinkError(format!("Failed to encode audit after-state: {}", e)))?;

        tracing::info!(
            target: "vendornet::audit",
            audit_id = %record.id,
            actor = %record.actor,
            operation = %record.operation,
            target_ref = %record.target,
            timestamp = %record.timestamp,
            before = %before,
            after = %after,
            "audit"
        );
        Ok(())
    }
}

/// Ring 7: append-only in-memory audit log. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl Observer for MemoryAuditLog {
    fn name(&self) -> &'static str {
        "MemoryAuditLog"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }
}

#[async_trait]
impl AuditObserver for MemoryAuditLog {
    async fn execute(&self, record: &AuditRecord) -> Result<(), ObserverError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
