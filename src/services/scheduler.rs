// Background task driving the time-triggered document transitions
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::services::network_service::VendorNetwork;

/// Handle to a running expiry task
pub struct ExpiryTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ExpiryTask {
    /// Stop the task after its current sweep and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!("Expiry task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run `expire_stale_corrections` and `expire_documents` every `period`
pub fn spawn_expiry_task(network: Arc<VendorNetwork>, period: Duration) -> ExpiryTask {
    let (shutdown, mut stop) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Expiry task started with period {:?}", period);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let corrections = network.expire_stale_corrections(now).await;
                    let documents = network.expire_documents(now).await;
                    if !corrections.is_empty() || !documents.is_empty() {
                        tracing::info!(
                            "Expiry sweep: {} stale corrections rejected, {} documents expired",
                            corrections.len(),
                            documents.len()
                        );
                    }
                }
            }
        }

        tracing::info!("Expiry task stopped");
    });

    ExpiryTask { shutdown, handle }
}

/// `spawn_expiry_task` with the period from the network's workflow configuration
pub fn spawn_configured_expiry_task(network: Arc<VendorNetwork>) -> ExpiryTask {
    let period = Duration::from_secs(network.config().workflow.expiry_interval_secs.max(1));
    spawn_expiry_task(network, period)
}
