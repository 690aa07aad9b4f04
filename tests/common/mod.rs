#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use vendornet::authority::NewGrant;
use vendornet::config::AppConfig;
use vendornet::hierarchy::{NewVendor, VendorType};
use vendornet::observer::{MemoryAuditLog, MemoryNotifier, ObserverBox};
use vendornet::services::VendorNetwork;
use vendornet::types::{UserId, VendorId};
use vendornet::workflow::{DocumentRecord, DocumentTypeSpec, NewDocument, NewDocumentType};

pub const SYSTEM: UserId = UserId::SYSTEM;

/// A network whose audit and notification rings write to memory
pub struct Harness {
    pub network: Arc<VendorNetwork>,
    pub audit: MemoryAuditLog,
    pub notifier: MemoryNotifier,
}

/// S (root) -> R -> C, all active
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub s: VendorId,
    pub r: VendorId,
    pub c: VendorId,
}

pub fn harness() -> Harness {
    harness_with(AppConfig::development())
}

pub fn harness_with(config: AppConfig) -> Harness {
    harness_with_observers(config, Vec::new())
}

/// Like `harness_with`, plus extra observers registered after the memory sinks
pub fn harness_with_observers(config: AppConfig, extra: Vec<ObserverBox>) -> Harness {
    let audit = MemoryAuditLog::new();
    let notifier = MemoryNotifier::new();
    let mut pipeline = VendorNetwork::pipeline_for(&config);
    pipeline.register_observer(ObserverBox::Audit(Box::new(audit.clone())));
    pipeline.register_observer(ObserverBox::Notification(Box::new(notifier.clone())));
    for observer in extra {
        pipeline.register_observer(observer);
    }

    Harness {
        network: Arc::new(VendorNetwork::with_pipeline(config, pipeline)),
        audit,
        notifier,
    }
}

impl Harness {
    pub async fn chain(&self) -> Result<Chain> {
        let s = self
            .network
            .insert_root(SYSTEM, NewVendor::new("Super", "S", VendorType::Super).active())
            .await?;
        let r = self
            .network
            .insert_vendor(SYSTEM, s.id, NewVendor::new("Regional", "R", VendorType::Regional).active())
            .await?;
        let c = self
            .network
            .insert_vendor(SYSTEM, r.id, NewVendor::new("City", "C", VendorType::City).active())
            .await?;
        Ok(Chain { s: s.id, r: r.id, c: c.id })
    }

    /// A new user holding each of `codes` at `vendor`
    pub async fn user_with(&self, vendor: VendorId, codes: &[&str]) -> Result<UserId> {
        let user = UserId::new();
        for code in codes {
            self.network
                .grant_permission(SYSTEM, NewGrant::organizational(vendor, user, *code))
                .await?;
        }
        Ok(user)
    }

    pub async fn document_type(&self, levels: u32) -> Result<DocumentTypeSpec> {
        let code = format!("type_{}", uuid::Uuid::new_v4().simple());
        Ok(self
            .network
            .register_document_type(SYSTEM, NewDocumentType::new(code, "Registration", levels))
            .await?)
    }

    /// Upload a document of a fresh `levels`-level type, as `uploader`
    pub async fn upload(&self, uploader: UserId, owner: VendorId, levels: u32) -> Result<DocumentRecord> {
        let spec = self.document_type(levels).await?;
        Ok(self
            .network
            .upload_document(uploader, NewDocument::new(spec.id, owner, "Vehicle RC"))
            .await?)
    }
}
