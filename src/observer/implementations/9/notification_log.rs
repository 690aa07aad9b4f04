// Ring 9: Notification sinks - delivery itself belongs to an external transport
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::observer::context::NotificationEvent;
use crate::observer::error::ObserverError;
use crate::observer::traits::{NotificationObserver, Observer, ObserverRing};
use crate::types::Operation;

/// Ring 9: logs workflow notifications on the `vendornet::notify` target
#[derive(Default)]
pub struct TracingNotifier;

impl Observer for TracingNotifier {
    fn name(&self) -> &'static str {
        "TracingNotifier"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Notification
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        !op.is_structural()
    }
}

#[async_trait]
impl NotificationObserver for TracingNotifier {
    async fn execute(&self, event: &NotificationEvent) -> Result<(), ObserverError> {
        let recipients: Vec<String> = event.recipients.iter().map(|r| r.to_string()).collect();
        tracing::info!(
            target: "vendornet::notify",
            kind = event.kind.as_str(),
            document_id = %event.document_id,
            vendor_id = %event.owner_vendor_id,
            level = event.level,
            recipients = %recipients.join(","),
            "notification"
        );
        Ok(())
    }
}

/// Ring 9: collects events in memory. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

impl Observer for MemoryNotifier {
    fn name(&self) -> &'static str {
        "MemoryNotifier"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Notification
    }
}

#[async_trait]
impl NotificationObserver for MemoryNotifier {
    async fn execute(&self, event: &NotificationEvent) -> Result<(), ObserverError> {
        if event.recipients.is_empty() {
            return Err(ObserverError::DeliveryError(format!(
                "{} notification for document {} has no recipients",
                event.kind.as_str(),
                event.document_id
            )));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
