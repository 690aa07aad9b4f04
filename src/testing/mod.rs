use std::sync::Arc;

use crate::authority::NewGrant;
use crate::config::AppConfig;
use crate::hierarchy::{NewVendor, VendorType};
use crate::observer::{MemoryAuditLog, MemoryNotifier, ObserverBox};
use crate::services::VendorNetwork;
use crate::types::{UserId, VendorId};
use crate::workflow::{DocumentRecord, NewDocument, NewDocumentType};

/// A network wired to in-memory observers, for asserting on side effects
pub struct TestContext {
    pub network: Arc<VendorNetwork>,
    pub audit: MemoryAuditLog,
    pub notifier: MemoryNotifier,
}

/// The three-vendor chain most scenarios start from: S is the root, R sits under S, C under R
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub super_vendor: VendorId,
    pub regional: VendorId,
    pub city: VendorId,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let audit = MemoryAuditLog::new();
        let notifier = MemoryNotifier::new();
        let mut pipeline = VendorNetwork::pipeline_for(&config);
        pipeline.register_observer(ObserverBox::Audit(Box::new(audit.clone())));
        pipeline.register_observer(ObserverBox::Notification(Box::new(notifier.clone())));

        Self {
            network: Arc::new(VendorNetwork::with_pipeline(config, pipeline)),
            audit,
            notifier,
        }
    }

    /// Build S -> R -> C as the system principal
    pub async fn chain(&self) -> anyhow::Result<Chain> {
        let system = UserId::SYSTEM;
        let s = self
            .network
            .insert_root(system, NewVendor::new("Super", "S", VendorType::Super).active())
            .await?;
        let r = self
            .network
            .insert_vendor(system, s.id, NewVendor::new("Regional", "R", VendorType::Regional).active())
            .await?;
        let c = self
            .network
            .insert_vendor(system, r.id, NewVendor::new("City", "C", VendorType::City).active())
            .await?;

        Ok(Chain {
            super_vendor: s.id,
            regional: r.id,
            city: c.id,
        })
    }

    /// A fresh user holding `codes` at `vendor`
    pub async fn user_with(&self, vendor: VendorId, codes: &[&str]) -> anyhow::Result<UserId> {
        let user = UserId::new();
        for code in codes {
            self.network
                .grant_permission(UserId::SYSTEM, NewGrant::organizational(vendor, user, *code))
                .await?;
        }
        Ok(user)
    }

    /// Register a document type and upload one document of it as the system principal
    pub async fn document(&self, owner: VendorId, levels: u32) -> anyhow::Result<DocumentRecord> {
        let code = format!("type_{}", uuid::Uuid::new_v4().simple());
        let spec = self
            .network
            .register_document_type(UserId::SYSTEM, NewDocumentType::new(code, "Test type", levels))
            .await?;
        let record = self
            .network
            .upload_document(UserId::SYSTEM, NewDocument::new(spec.id, owner, "Test document"))
            .await?;
        Ok(record)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chain_is_nested() {
        let ctx = TestContext::new();
        let chain = ctx.chain().await.unwrap();

        assert!(ctx.network.is_ancestor_of(chain.super_vendor, chain.city).await.unwrap());
        assert!(!ctx.network.is_ancestor_of(chain.city, chain.regional).await.unwrap());
        assert_eq!(ctx.audit.len().await, 3);
    }
}
