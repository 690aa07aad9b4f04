// Observer implementations organized by rings
// Each ring handles a specific phase of post-commit processing

// Ring 7: Audit - compliance logging
#[path = "7/audit_log.rs"]
pub mod audit_log;

// Ring 9: Notification - workflow outcome events
#[path = "9/notification_log.rs"]
pub mod notification_log;

// Helper for registering observers (not ring-specific)
pub mod default_observers;
pub use default_observers::*;

// Ring 7 re-exports
pub use audit_log::*;

// Ring 9 re-exports
pub use notification_log::*;
