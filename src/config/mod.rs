use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::hierarchy::Capacity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub hierarchy: HierarchyConfig,
    pub authority: AuthorityConfig,
    pub workflow: WorkflowConfig,
    pub observer: ObserverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    pub default_max_sub_vendors: u32,
    pub default_max_drivers: u32,
    pub default_max_vehicles: u32,
    /// Run the full O(n log n) invariant check after every structural mutation
    pub verify_invariants: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub max_delegation_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub default_correction_days: i64,
    pub expiry_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub timeout_ms: u64,
    pub enable_audit_logging: bool,
    pub enable_notification_logging: bool,
}

impl HierarchyConfig {
    pub fn default_capacity(&self) -> Capacity {
        Capacity {
            max_sub_vendors: self.default_max_sub_vendors,
            max_drivers: self.default_max_drivers,
            max_vehicles: self.default_max_vehicles,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Hierarchy overrides
        if let Ok(v) = env::var("HIERARCHY_MAX_SUB_VENDORS") {
            self.hierarchy.default_max_sub_vendors = v.parse().unwrap_or(self.hierarchy.default_max_sub_vendors);
        }
        if let Ok(v) = env::var("HIERARCHY_MAX_DRIVERS") {
            self.hierarchy.default_max_drivers = v.parse().unwrap_or(self.hierarchy.default_max_drivers);
        }
        if let Ok(v) = env::var("HIERARCHY_MAX_VEHICLES") {
            self.hierarchy.default_max_vehicles = v.parse().unwrap_or(self.hierarchy.default_max_vehicles);
        }
        if let Ok(v) = env::var("HIERARCHY_VERIFY_INVARIANTS") {
            self.hierarchy.verify_invariants = v.parse().unwrap_or(self.hierarchy.verify_invariants);
        }

        // Authority overrides
        if let Ok(v) = env::var("AUTHORITY_MAX_DELEGATION_DEPTH") {
            self.authority.max_delegation_depth = v.parse().unwrap_or(self.authority.max_delegation_depth);
        }

        // Workflow overrides
        if let Ok(v) = env::var("WORKFLOW_DEFAULT_CORRECTION_DAYS") {
            self.workflow.default_correction_days = v.parse().unwrap_or(self.workflow.default_correction_days);
        }
        if let Ok(v) = env::var("WORKFLOW_EXPIRY_INTERVAL_SECS") {
            self.workflow.expiry_interval_secs = v.parse().unwrap_or(self.workflow.expiry_interval_secs);
        }

        // Observer overrides
        if let Ok(v) = env::var("OBSERVER_TIMEOUT_MS") {
            self.observer.timeout_ms = v.parse().unwrap_or(self.observer.timeout_ms);
        }
        if let Ok(v) = env::var("OBSERVER_ENABLE_AUDIT_LOGGING") {
            self.observer.enable_audit_logging = v.parse().unwrap_or(self.observer.enable_audit_logging);
        }
        if let Ok(v) = env::var("OBSERVER_ENABLE_NOTIFICATION_LOGGING") {
            self.observer.enable_notification_logging = v.parse().unwrap_or(self.observer.enable_notification_logging);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            hierarchy: HierarchyConfig {
                default_max_sub_vendors: 5,
                default_max_drivers: 10,
                default_max_vehicles: 10,
                verify_invariants: true,
            },
            authority: AuthorityConfig {
                max_delegation_depth: 8,
            },
            workflow: WorkflowConfig {
                default_correction_days: 7,
                expiry_interval_secs: 300,
            },
            observer: ObserverConfig {
                timeout_ms: 5_000,
                enable_audit_logging: true,
                enable_notification_logging: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            hierarchy: HierarchyConfig {
                default_max_sub_vendors: 5,
                default_max_drivers: 10,
                default_max_vehicles: 10,
                verify_invariants: true,
            },
            authority: AuthorityConfig {
                max_delegation_depth: 4,
            },
            workflow: WorkflowConfig {
                default_correction_days: 7,
                expiry_interval_secs: 900,
            },
            observer: ObserverConfig {
                timeout_ms: 3_000,
                enable_audit_logging: true,
                enable_notification_logging: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            hierarchy: HierarchyConfig {
                default_max_sub_vendors: 5,
                default_max_drivers: 10,
                default_max_vehicles: 10,
                verify_invariants: false,
            },
            authority: AuthorityConfig {
                max_delegation_depth: 4,
            },
            workflow: WorkflowConfig {
                default_correction_days: 14,
                expiry_interval_secs: 3_600,
            },
            observer: ObserverConfig {
                timeout_ms: 2_000,
                enable_audit_logging: true,
                enable_notification_logging: false,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
