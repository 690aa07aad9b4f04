// Observer pipeline: dispatches committed changes to the audit and notification rings
use futures::future::join_all;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::observer::context::{AuditRecord, NotificationEvent};
use crate::observer::error::{DispatchReport, ObserverError};
use crate::observer::traits::{ObserverBox, ObserverRing};
use crate::types::Operation;

/// Runs every applicable observer of a ring concurrently, each under a timeout.
/// Failures are logged and reported, never propagated.
pub struct ObserverPipeline {
    // Observer registry by ring
    observers: HashMap<ObserverRing, Vec<ObserverBox>>,

    // Upper bound on any single observer's timeout
    max_timeout: Duration,
}

impl ObserverPipeline {
    /// Create new observer pipeline with empty observer registry
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
            max_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    /// Register an observer (type-safe registration)
    pub fn register_observer(&mut self, observer: ObserverBox) {
        let ring = observer.ring();
        let name = observer.name();
        self.observers.entry(ring).or_default().push(observer);

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub fn observer_count(&self, ring: ObserverRing) -> usize {
        self.observers.get(&ring).map_or(0, Vec::len)
    }

    /// Ring 7
    pub async fn audit(&self, record: &AuditRecord) -> DispatchReport {
        self.dispatch(ObserverRing::Audit, record.operation, |observer| {
            observer.execute_audit(record)
        })
        .await
    }

    /// Ring 9
    pub async fn notify(&self, operation: Operation, event: &NotificationEvent) -> DispatchReport {
        self.dispatch(ObserverRing::Notification, operation, |observer| {
            observer.execute_notification(event)
        })
        .await
    }

    async fn dispatch<'a, F, Fut>(&'a self, ring: ObserverRing, operation: Operation, run: F) -> DispatchReport
    where
        F: Fn(&'a ObserverBox) -> Fut,
        Fut: std::future::Future<Output = Result<(), ObserverError>> + 'a,
    {
        let observers = match self.observers.get(&ring) {
            Some(obs) => obs,
            None => {
                tracing::trace!("No observers registered for ring {:?}", ring);
                return DispatchReport::default();
            }
        };

        let runs = observers
            .iter()
            .filter(|observer| observer.applies_to_operation(operation))
            .map(|observer| {
                let limit = observer.timeout().min(self.max_timeout);
                let fut = run(observer);
                async move {
                    let started = Instant::now();
                    let outcome = match timeout(limit, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(ObserverError::TimeoutError(format!(
                            "Observer {} timed out after {:?}",
                            observer.name(),
                            limit
                        ))),
                    };
                    (observer.name(), outcome, started.elapsed())
                }
            });

        let mut report = DispatchReport::default();
        for (name, outcome, elapsed) in join_all(runs).await {
            match outcome {
                Ok(()) => {
                    tracing::debug!("Observer: {} completed in {:?}", name, elapsed);
                    report.delivered += 1;
                }
                Err(error) => {
                    tracing::warn!("Observer: {} failed for {} in {:?}: {}", name, operation, elapsed, error);
                    report.failed.push((name.to_string(), error));
                }
            }
        }
        report
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::context::AuditTarget;
    use crate::observer::implementations::MemoryAuditLog;
    use crate::observer::traits::{AuditObserver, Observer};
    use crate::types::{UserId, VendorId};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    struct SlowAudit;

    impl Observer for SlowAudit {
        fn name(&self) -> &'static str {
            "SlowAudit"
        }

        fn ring(&self) -> ObserverRing {
            ObserverRing::Audit
        }
    }

    #[async_trait]
    impl AuditObserver for SlowAudit {
        async fn execute(&self, _record: &AuditRecord) -> Result<(), ObserverError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn record() -> AuditRecord {
        AuditRecord::new(
            UserId::SYSTEM,
            Operation::InsertVendor,
            AuditTarget::Vendor(VendorId(1)),
            json!(null),
            json!({"id": 1}),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_audit_reaches_registered_sink() {
        let log = MemoryAuditLog::new();
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(ObserverBox::Audit(Box::new(log.clone())));

        let report = pipeline.audit(&record()).await;
        assert!(report.is_clean());
        assert_eq!(report.delivered, 1);
        assert_eq!(log.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_observer_times_out_without_blocking_others() {
        let log = MemoryAuditLog::new();
        let mut pipeline = ObserverPipeline::new().with_max_timeout(Duration::from_millis(20));
        pipeline.register_observer(ObserverBox::Audit(Box::new(SlowAudit)));
        pipeline.register_observer(ObserverBox::Audit(Box::new(log.clone())));

        let report = pipeline.audit(&record()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, ObserverError::TimeoutError(_)));
        assert_eq!(log.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_ring_is_noop() {
        let pipeline = ObserverPipeline::new();
        let report = pipeline.audit(&record()).await;
        assert_eq!(report, DispatchReport::default());
    }
}
