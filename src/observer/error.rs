use thiserror::Error;

/// Observer failures. These are logged by the pipeline and never reach the
/// caller of the operation that triggered them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("Sink error: {0}")]
    SinkError(String),

    #[error("Delivery error: {0}")]
    DeliveryError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),
}

/// Outcome of dispatching one record or event to a ring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: Vec<(String, ObserverError)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
