// Helper for registering the observers enabled by configuration
use crate::config::ObserverConfig;
use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::ObserverBox;
use super::{TracingAuditObserver, TracingNotifier};

/// Register the logging observers switched on in `config`
pub fn register_all_observers(pipeline: &mut ObserverPipeline, config: &ObserverConfig) {
    if config.enable_audit_logging {
        pipeline.register_observer(ObserverBox::Audit(Box::new(TracingAuditObserver)));
    }
    if config.enable_notification_logging {
        pipeline.register_observer(ObserverBox::Notification(Box::new(TracingNotifier)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::observer::traits::ObserverRing;

    #[test]
    fn test_registration_follows_config() {
        let mut config = AppConfig::development().observer;
        let mut pipeline = ObserverPipeline::new();
        register_all_observers(&mut pipeline, &config);
        assert_eq!(pipeline.observer_count(ObserverRing::Audit), 1);
        assert_eq!(pipeline.observer_count(ObserverRing::Notification), 1);

        config.enable_notification_logging = false;
        let mut quiet = ObserverPipeline::new();
        register_all_observers(&mut quiet, &config);
        assert_eq!(quiet.observer_count(ObserverRing::Notification), 0);
    }
}
