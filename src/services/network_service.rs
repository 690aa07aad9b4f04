// Transactional façade over the hierarchy, authority and workflow layers
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::authority::{
    Authority, AuthorityResolver, GrantSource, NewGrant, PermissionGrant, MANAGE_DOCUMENTS, MANAGE_PERMISSIONS,
    MANAGE_VENDORS, UPLOAD_DOCUMENT, VERIFY_DOCUMENT,
};
use crate::config::AppConfig;
use crate::error::{CurrentState, DenialReason, NetworkError, NetworkResult, Rejection, ServiceResult};
use crate::hierarchy::{AssetKind, NewVendor, VendorNode, VendorStatus};
use crate::observer::{register_all_observers, AuditRecord, AuditTarget, NotificationEvent, ObserverPipeline};
use crate::services::state::{AssetCounts, NetworkState, Snapshot};
use crate::types::{DocumentId, DocumentTypeId, GrantId, Operation, UserId, VendorId};
use crate::workflow::{
    DocumentEntry, DocumentRecord, DocumentStatus, DocumentTypeSpec, NewDocument, NewDocumentType, Transition,
    VerificationAction, VerificationRequest,
};

type DocumentSlot = Arc<Mutex<DocumentEntry>>;

/// Result of a subtree deletion
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub removed: Vec<VendorNode>,
    pub revoked_grants: Vec<PermissionGrant>,
    pub archived_documents: Vec<DocumentId>,
}

/// The vendor network service.
///
/// Locking model:
/// - `gate` is held for writing by hierarchy, grant and asset mutations, which
///   serializes them against each other and against workflow transitions.
/// - Workflow transitions hold `gate` for reading plus the mutex of their one
///   document, so transitions on different documents run in parallel while the
///   authority they checked cannot change underneath them.
/// - Queries clone the committed `Arc<Snapshot>` and never wait on the gate.
pub struct VendorNetwork {
    gate: RwLock<()>,
    snapshot: RwLock<Arc<Snapshot>>,
    documents: RwLock<HashMap<DocumentId, DocumentSlot>>,
    document_types: RwLock<BTreeMap<DocumentTypeId, DocumentTypeSpec>>,
    pipeline: ObserverPipeline,
    config: AppConfig,
}

impl VendorNetwork {
    /// Empty network with the observers enabled in `config`
    pub fn new(config: AppConfig) -> Self {
        let mut pipeline = Self::pipeline_for(&config);
        register_all_observers(&mut pipeline, &config.observer);
        Self::with_pipeline(config, pipeline)
    }

    /// Empty network dispatching to a caller-built pipeline
    pub fn with_pipeline(config: AppConfig, pipeline: ObserverPipeline) -> Self {
        let snapshot = Snapshot::empty(config.hierarchy.default_capacity());
        Self {
            gate: RwLock::new(()),
            snapshot: RwLock::new(Arc::new(snapshot)),
            documents: RwLock::new(HashMap::new()),
            document_types: RwLock::new(BTreeMap::new()),
            pipeline,
            config,
        }
    }

    /// Pipeline with the configured timeout and no observers
    pub fn pipeline_for(config: &AppConfig) -> ObserverPipeline {
        ObserverPipeline::new().with_max_timeout(Duration::from_millis(config.observer.timeout_ms))
    }

    /// Rebuild a network from an exported state
    pub fn from_state(state: NetworkState, config: AppConfig, pipeline: ObserverPipeline) -> NetworkResult<Self> {
        let snapshot = state.to_snapshot(config.hierarchy.default_capacity())?;

        let mut types = BTreeMap::new();
        for spec in state.document_types {
            if types.insert(spec.id, spec).is_some() {
                return Err(NetworkError::validation("duplicate document type id in state"));
            }
        }

        let mut documents = HashMap::new();
        for entry in state.documents {
            if snapshot.tree.node(entry.record.owner_vendor_id).is_none() && entry.record.status != DocumentStatus::Archived {
                return Err(NetworkError::validation(format!(
                    "document {} is owned by unknown vendor {}",
                    entry.record.id, entry.record.owner_vendor_id
                )));
            }
            documents.insert(entry.id(), Arc::new(Mutex::new(entry)));
        }

        Ok(Self {
            gate: RwLock::new(()),
            snapshot: RwLock::new(Arc::new(snapshot)),
            documents: RwLock::new(documents),
            document_types: RwLock::new(types),
            pipeline,
            config,
        })
    }

    /// Export the committed state. Waits for in-flight mutations to finish.
    pub async fn export_state(&self) -> NetworkState {
        let _gate = self.gate.write().await;
        let snapshot = self.current().await;
        let types: Vec<DocumentTypeSpec> = self.document_types.read().await.values().cloned().collect();

        let mut documents = Vec::new();
        for slot in self.document_slots().await {
            documents.push(slot.lock().await.clone());
        }
        documents.sort_by_key(|d| (d.record.uploaded_at, d.record.id));

        NetworkState::from_snapshot(&snapshot, types, documents)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ========================================
    // Queries
    // ========================================

    /// Latest committed snapshot
    pub async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn vendor(&self, id: VendorId) -> ServiceResult<VendorNode> {
        Ok(self.current().await.tree.get(id)?.clone())
    }

    pub async fn root(&self) -> Option<VendorNode> {
        self.current().await.tree.root().cloned()
    }

    pub async fn vendors(&self) -> Vec<VendorNode> {
        self.current().await.tree.iter().cloned().collect()
    }

    pub async fn ancestors(&self, id: VendorId) -> ServiceResult<Vec<VendorNode>> {
        let snapshot = self.current().await;
        let ancestors = snapshot.tree.ancestors(id)?;
        Ok(ancestors.into_iter().cloned().collect())
    }

    pub async fn descendants(&self, id: VendorId) -> ServiceResult<Vec<VendorNode>> {
        let snapshot = self.current().await;
        let descendants = snapshot.tree.descendants(id)?;
        Ok(descendants.into_iter().cloned().collect())
    }

    pub async fn children(&self, id: VendorId) -> ServiceResult<Vec<VendorNode>> {
        let snapshot = self.current().await;
        let children = snapshot.tree.children(id)?;
        Ok(children.into_iter().cloned().collect())
    }

    pub async fn is_ancestor_of(&self, ancestor: VendorId, descendant: VendorId) -> ServiceResult<bool> {
        Ok(self.current().await.tree.is_ancestor_of(ancestor, descendant)?)
    }

    pub async fn assets(&self, vendor: VendorId) -> ServiceResult<AssetCounts> {
        let snapshot = self.current().await;
        snapshot.tree.get(vendor)?;
        Ok(snapshot.assets_of(vendor))
    }

    pub async fn resolve(&self, user: UserId, vendor: VendorId, code: &str) -> ServiceResult<Authority> {
        let snapshot = self.current().await;
        Ok(self.resolver(&snapshot).resolve(user, vendor, code, Utc::now())?)
    }

    pub async fn effective_permissions(&self, user: UserId, vendor: VendorId) -> ServiceResult<Vec<String>> {
        let snapshot = self.current().await;
        Ok(self.resolver(&snapshot).effective_permissions(user, vendor, Utc::now())?)
    }

    pub async fn grants(&self) -> Vec<PermissionGrant> {
        self.current().await.grants.iter().cloned().collect()
    }

    pub async fn grants_for_vendor(&self, vendor: VendorId) -> Vec<PermissionGrant> {
        self.current().await.grants.for_vendor(vendor).cloned().collect()
    }

    pub async fn document_type(&self, id: DocumentTypeId) -> ServiceResult<DocumentTypeSpec> {
        self.document_types
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| NetworkError::not_found(format!("document type {}", id)).into())
    }

    pub async fn document_types(&self) -> Vec<DocumentTypeSpec> {
        self.document_types.read().await.values().cloned().collect()
    }

    /// The document with its decision slots and history
    pub async fn document(&self, id: DocumentId) -> ServiceResult<DocumentEntry> {
        let slot = self.document_slot(id).await?;
        let entry = slot.lock().await;
        Ok(entry.clone())
    }

    pub async fn documents_for_vendor(&self, vendor: VendorId) -> Vec<DocumentRecord> {
        let mut records = Vec::new();
        for slot in self.document_slots().await {
            let entry = slot.lock().await;
            if entry.record.owner_vendor_id == vendor {
                records.push(entry.record.clone());
            }
        }
        records.sort_by_key(|r| (r.uploaded_at, r.id));
        records
    }

    // ========================================
    // Hierarchy mutations
    // ========================================

    /// Create the root vendor. Only the system principal may bootstrap a network.
    pub async fn insert_root(&self, actor: UserId, attrs: NewVendor) -> ServiceResult<VendorNode> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let staged = (|| -> NetworkResult<_> {
            if !actor.is_system() {
                return Err(NetworkError::denied(DenialReason::NoGrant));
            }
            let mut next = (*current).clone();
            let id = next.tree.insert_root(attrs, now)?;
            let node = next.tree.get(id)?.clone();
            self.verify(&next)?;
            Ok((next, node))
        })();
        let (next, node) = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.reject_vendor(&current, Operation::InsertVendor, actor, None, error)),
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, Operation::InsertVendor, AuditTarget::Vendor(node.id), Value::Null, &node)
            .await;
        Ok(node)
    }

    /// Insert a vendor as the rightmost child of `parent_id`
    pub async fn insert_vendor(&self, actor: UserId, parent_id: VendorId, attrs: NewVendor) -> ServiceResult<VendorNode> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let staged = (|| -> NetworkResult<_> {
            self.resolver(&current).require(actor, parent_id, MANAGE_VENDORS, now)?;
            let mut next = (*current).clone();
            let id = next.tree.insert_child(parent_id, attrs, now)?;
            let node = next.tree.get(id)?.clone();
            self.verify(&next)?;
            Ok((next, node))
        })();
        let (next, node) = match staged {
            Ok(staged) => staged,
            Err(error) => {
                return Err(self.reject_vendor(&current, Operation::InsertVendor, actor, Some(parent_id), error))
            }
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, Operation::InsertVendor, AuditTarget::Vendor(node.id), Value::Null, &node)
            .await;
        Ok(node)
    }

    /// Re-parent a subtree. Requires `manage_vendors` over both the node and the new parent.
    pub async fn move_vendor(&self, actor: UserId, node_id: VendorId, new_parent_id: VendorId) -> ServiceResult<VendorNode> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let staged = (|| -> NetworkResult<_> {
            let resolver = self.resolver(&current);
            resolver.require(actor, node_id, MANAGE_VENDORS, now)?;
            resolver.require(actor, new_parent_id, MANAGE_VENDORS, now)?;
            let before = current.tree.get(node_id)?.clone();
            let mut next = (*current).clone();
            next.tree.move_subtree(node_id, new_parent_id)?;
            let after = next.tree.get(node_id)?.clone();
            self.verify(&next)?;
            Ok((next, before, after))
        })();
        let (next, before, after) = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.reject_vendor(&current, Operation::MoveVendor, actor, Some(node_id), error)),
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, Operation::MoveVendor, AuditTarget::Vendor(node_id), &before, &after)
            .await;
        Ok(after)
    }

    /// Delete a vendor and its subtree, cascading grants and asset counts.
    /// With `force`, documents owned inside the subtree are archived.
    pub async fn delete_vendor(&self, actor: UserId, node_id: VendorId, force: bool) -> ServiceResult<DeleteOutcome> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        // Owned records per vendor. Transitions are excluded by the gate, so these stay accurate.
        let mut owned: HashMap<VendorId, usize> = current
            .assets
            .iter()
            .map(|(vendor, counts)| (*vendor, counts.total()))
            .collect();
        let mut owned_documents: Vec<DocumentSlot> = Vec::new();
        for slot in self.document_slots().await {
            let entry = slot.lock().await;
            if entry.record.status != DocumentStatus::Archived {
                *owned.entry(entry.record.owner_vendor_id).or_default() += 1;
                drop(entry);
                owned_documents.push(slot);
            }
        }

        let staged = (|| -> NetworkResult<_> {
            self.resolver(&current).require(actor, node_id, MANAGE_VENDORS, now)?;
            let mut next = (*current).clone();
            let removed = next
                .tree
                .delete_subtree(node_id, force, |id| owned.get(&id).copied().unwrap_or(0))?;
            let removed_ids: HashSet<VendorId> = removed.iter().map(|n| n.id).collect();
            let revoked_grants = next.grants.remove_for_vendors(&removed_ids);
            next.assets.retain(|vendor, _| !removed_ids.contains(vendor));
            self.verify(&next)?;
            Ok((next, removed, removed_ids, revoked_grants))
        })();
        let (next, removed, removed_ids, revoked_grants) = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.reject_vendor(&current, Operation::DeleteVendor, actor, Some(node_id), error)),
        };

        self.publish(next).await;

        let mut archived_documents = Vec::new();
        for slot in owned_documents {
            let mut entry = slot.lock().await;
            if removed_ids.contains(&entry.record.owner_vendor_id) {
                if let Ok(transition) = entry.archive(now) {
                    archived_documents.push(transition.after.id);
                }
            }
        }
        drop(gate);

        let outcome = DeleteOutcome {
            removed,
            revoked_grants,
            archived_documents,
        };
        self.commit(
            actor,
            Operation::DeleteVendor,
            AuditTarget::Vendor(node_id),
            &outcome.removed,
            json!({
                "force": force,
                "removed": outcome.removed.iter().map(|n| n.id).collect::<Vec<_>>(),
                "revoked_grants": outcome.revoked_grants.iter().map(|g| g.id).collect::<Vec<_>>(),
                "archived_documents": outcome.archived_documents,
            }),
        )
        .await;
        Ok(outcome)
    }

    pub async fn update_vendor_status(&self, actor: UserId, id: VendorId, status: VendorStatus) -> ServiceResult<VendorNode> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let staged = (|| -> NetworkResult<_> {
            self.resolver(&current).require(actor, id, MANAGE_VENDORS, now)?;
            let before = current.tree.get(id)?.clone();
            let mut next = (*current).clone();
            next.tree.set_status(id, status)?;
            let after = next.tree.get(id)?.clone();
            Ok((next, before, after))
        })();
        let (next, before, after) = match staged {
            Ok(staged) => staged,
            Err(error) => {
                return Err(self.reject_vendor(&current, Operation::UpdateVendorStatus, actor, Some(id), error))
            }
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, Operation::UpdateVendorStatus, AuditTarget::Vendor(id), &before, &after)
            .await;
        Ok(after)
    }

    /// Take one driver or vehicle slot on a vendor
    pub async fn attach_asset(&self, actor: UserId, vendor: VendorId, kind: AssetKind) -> ServiceResult<AssetCounts> {
        self.adjust_asset(actor, vendor, kind, Operation::AttachAsset).await
    }

    /// Release one driver or vehicle slot
    pub async fn detach_asset(&self, actor: UserId, vendor: VendorId, kind: AssetKind) -> ServiceResult<AssetCounts> {
        self.adjust_asset(actor, vendor, kind, Operation::DetachAsset).await
    }

    async fn adjust_asset(
        &self,
        actor: UserId,
        vendor: VendorId,
        kind: AssetKind,
        operation: Operation,
    ) -> ServiceResult<AssetCounts> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let staged = (|| -> NetworkResult<_> {
            self.resolver(&current).require(actor, vendor, MANAGE_VENDORS, now)?;
            let node = current.tree.get(vendor)?;
            let before = current.assets_of(vendor);
            let mut after = before;
            let slot = after.get_mut(kind);
            if operation == Operation::AttachAsset {
                let limit = kind.limit(&node.capacity);
                if *slot >= limit {
                    return Err(NetworkError::CapacityExceeded {
                        vendor_id: vendor,
                        resource: kind.as_str().to_string(),
                        limit,
                    });
                }
                *slot += 1;
            } else {
                if *slot == 0 {
                    return Err(NetworkError::invalid_operation(format!(
                        "vendor {} has no {} attached",
                        vendor,
                        kind.as_str()
                    )));
                }
                *slot -= 1;
            }
            let mut next = (*current).clone();
            next.assets.insert(vendor, after);
            Ok((next, before, after))
        })();
        let (next, before, after) = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.reject_vendor(&current, operation, actor, Some(vendor), error)),
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, operation, AuditTarget::Vendor(vendor), &before, &after).await;
        Ok(after)
    }

    // ========================================
    // Grant mutations
    // ========================================

    /// Create a grant. Organizational grants need `manage_permissions` over the
    /// vendor; delegated grants need the same code held with `can_delegate`.
    pub async fn grant_permission(&self, actor: UserId, request: NewGrant) -> ServiceResult<PermissionGrant> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let staged = (|| -> NetworkResult<_> {
            if request.expires_at.map_or(false, |at| at <= now) {
                return Err(NetworkError::validation("grant expiry must be in the future"));
            }
            let resolver = self.resolver(&current);
            match request.source {
                GrantSource::Organizational => {
                    resolver.require(actor, request.vendor_id, MANAGE_PERMISSIONS, now)?;
                }
                GrantSource::Delegated => {
                    resolver
                        .resolve_delegation(actor, request.vendor_id, &request.permission_code, now)?
                        .into_result()?;
                }
            }
            let grant = request.into_grant(actor, now);
            let mut next = (*current).clone();
            next.grants.insert(grant.clone())?;
            Ok((next, grant))
        })();
        let (next, grant) = match staged {
            Ok(staged) => staged,
            Err(error) => {
                self.log_rejection(Operation::GrantPermission, actor, &error);
                return Err(Rejection::new(error));
            }
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, Operation::GrantPermission, AuditTarget::Grant(grant.id), Value::Null, &grant)
            .await;
        Ok(grant)
    }

    /// Revoke a grant. The original grantor, or anyone with `manage_permissions`
    /// over its vendor, may revoke it.
    pub async fn revoke_permission(&self, actor: UserId, grant_id: GrantId) -> ServiceResult<PermissionGrant> {
        let gate = self.gate.write().await;
        let current = self.current().await;
        let now = Utc::now();

        let existing = current.grants.get(grant_id).cloned();
        let staged = (|| -> NetworkResult<_> {
            let grant = existing
                .clone()
                .ok_or_else(|| NetworkError::not_found(format!("grant {}", grant_id)))?;
            if grant.granted_by != actor {
                self.resolver(&current)
                    .require(actor, grant.vendor_id, MANAGE_PERMISSIONS, now)?;
            }
            let mut next = (*current).clone();
            let removed = next.grants.remove(grant_id)?;
            Ok((next, removed))
        })();
        let (next, removed) = match staged {
            Ok(staged) => staged,
            Err(error) => {
                self.log_rejection(Operation::RevokePermission, actor, &error);
                return Err(Rejection::new(error).with_current(existing.map(CurrentState::Grant)));
            }
        };

        self.publish(next).await;
        drop(gate);

        self.commit(actor, Operation::RevokePermission, AuditTarget::Grant(grant_id), &removed, Value::Null)
            .await;
        Ok(removed)
    }

    // ========================================
    // Document types
    // ========================================

    /// Register a document type. Needs `manage_documents` at the root.
    pub async fn register_document_type(&self, actor: UserId, request: NewDocumentType) -> ServiceResult<DocumentTypeSpec> {
        let _gate = self.gate.read().await;
        let current = self.current().await;
        let now = Utc::now();
        let mut types = self.document_types.write().await;

        let staged = (|| -> NetworkResult<_> {
            if !actor.is_system() {
                let root = current
                    .tree
                    .root()
                    .ok_or_else(|| NetworkError::denied(DenialReason::NoGrant))?;
                self.resolver(&current).require(actor, root.id, MANAGE_DOCUMENTS, now)?;
            }
            if types.values().any(|t| t.code == request.code) {
                return Err(NetworkError::validation(format!(
                    "document type code '{}' is already in use",
                    request.code
                )));
            }
            let id = DocumentTypeId(types.keys().next_back().map_or(1, |id| id.0 + 1));
            request.into_spec(id)
        })();
        let spec = match staged {
            Ok(spec) => spec,
            Err(error) => {
                self.log_rejection(Operation::RegisterDocumentType, actor, &error);
                return Err(Rejection::new(error));
            }
        };
        types.insert(spec.id, spec.clone());
        drop(types);

        self.commit(actor, Operation::RegisterDocumentType, AuditTarget::DocumentType(spec.id), Value::Null, &spec)
            .await;
        Ok(spec)
    }

    // ========================================
    // Workflow
    // ========================================

    /// Upload a document for a vendor. Needs `upload_document` over the owner.
    pub async fn upload_document(&self, actor: UserId, request: NewDocument) -> ServiceResult<DocumentRecord> {
        let gate = self.gate.read().await;
        let current = self.current().await;
        let now = Utc::now();
        let spec = self.document_types.read().await.get(&request.document_type_id).cloned();

        let staged = (|| -> NetworkResult<_> {
            let spec = spec.ok_or_else(|| NetworkError::not_found(format!("document type {}", request.document_type_id)))?;
            let owner = request.owner_vendor_id;
            self.resolver(&current).require(actor, owner, UPLOAD_DOCUMENT, now)?;
            DocumentEntry::upload(DocumentId::new(), &spec, request, actor, now)
        })();
        let entry = match staged {
            Ok(entry) => entry,
            Err(error) => {
                self.log_rejection(Operation::UploadDocument, actor, &error);
                return Err(Rejection::new(error));
            }
        };

        let record = entry.record.clone();
        self.documents
            .write()
            .await
            .insert(record.id, Arc::new(Mutex::new(entry)));
        drop(gate);

        self.commit(actor, Operation::UploadDocument, AuditTarget::Document(record.id), Value::Null, &record)
            .await;
        if let Some(event) = NotificationEvent::for_transition(&record, None, now) {
            self.pipeline.notify(Operation::UploadDocument, &event).await;
        }
        Ok(record)
    }

    /// Record a verification decision at `request.level`
    pub async fn apply(&self, actor: UserId, document_id: DocumentId, request: VerificationRequest) -> ServiceResult<DocumentRecord> {
        let escalatee = escalation_target(&request);
        self.transition(
            actor,
            document_id,
            Operation::ApplyVerification,
            |resolver, record, now| authorize_verification(resolver, actor, escalatee, record, now),
            |entry, now| entry.apply(actor, request, now),
        )
        .await
    }

    /// `apply`, rejected with `VerificationConflict` if the document moved past `expected_version`
    pub async fn apply_if_version(
        &self,
        actor: UserId,
        document_id: DocumentId,
        expected_version: u64,
        request: VerificationRequest,
    ) -> ServiceResult<DocumentRecord> {
        let escalatee = escalation_target(&request);
        self.transition(
            actor,
            document_id,
            Operation::ApplyVerification,
            |resolver, record, now| authorize_verification(resolver, actor, escalatee, record, now),
            |entry, now| entry.apply_if_version(expected_version, actor, request, now),
        )
        .await
    }

    /// Clear an outstanding correction request. The uploader or a holder of
    /// `manage_documents` over the owner may resubmit.
    pub async fn resubmit(&self, actor: UserId, document_id: DocumentId) -> ServiceResult<DocumentRecord> {
        self.transition(
            actor,
            document_id,
            Operation::ResubmitDocument,
            |resolver, record, now| {
                if record.uploaded_by == actor {
                    Ok(())
                } else {
                    resolver.require(actor, record.owner_vendor_id, MANAGE_DOCUMENTS, now)
                }
            },
            |entry, now| entry.resubmit(actor, now),
        )
        .await
    }

    pub async fn archive(&self, actor: UserId, document_id: DocumentId) -> ServiceResult<DocumentRecord> {
        self.transition(
            actor,
            document_id,
            Operation::ArchiveDocument,
            |resolver, record, now| resolver.require(actor, record.owner_vendor_id, MANAGE_DOCUMENTS, now),
            |entry, now| entry.archive(now),
        )
        .await
    }

    /// Reject documents whose correction deadline passed without resubmission.
    /// Running it again on the same state changes nothing.
    pub async fn expire_stale_corrections(&self, now: DateTime<Utc>) -> Vec<DocumentRecord> {
        self.sweep(Operation::ExpireCorrection, now, |entry, now| entry.expire_correction(now))
            .await
    }

    /// Expire verified documents past their expiry date
    pub async fn expire_documents(&self, now: DateTime<Utc>) -> Vec<DocumentRecord> {
        self.sweep(Operation::ExpireDocument, now, |entry, now| entry.expire(now))
            .await
    }

    async fn sweep<F>(&self, operation: Operation, now: DateTime<Utc>, step: F) -> Vec<DocumentRecord>
    where
        F: Fn(&mut DocumentEntry, DateTime<Utc>) -> Option<Transition>,
    {
        let gate = self.gate.read().await;
        let mut transitions = Vec::new();
        for slot in self.document_slots().await {
            let mut entry = slot.lock().await;
            if let Some(transition) = step(&mut *entry, now) {
                transitions.push(transition);
            }
        }
        drop(gate);

        if !transitions.is_empty() {
            tracing::info!("{} swept {} documents", operation, transitions.len());
        }

        let mut records = Vec::with_capacity(transitions.len());
        for transition in transitions {
            self.finish_transition(UserId::SYSTEM, operation, &transition, now).await;
            records.push(transition.after);
        }
        records
    }

    async fn transition<A, M>(
        &self,
        actor: UserId,
        document_id: DocumentId,
        operation: Operation,
        authorize: A,
        mutate: M,
    ) -> ServiceResult<DocumentRecord>
    where
        A: FnOnce(&AuthorityResolver<'_>, &DocumentRecord, DateTime<Utc>) -> NetworkResult<()>,
        M: FnOnce(&mut DocumentEntry, DateTime<Utc>) -> NetworkResult<Transition>,
    {
        let gate = self.gate.read().await;
        let slot = match self.document_slot(document_id).await {
            Ok(slot) => slot,
            Err(error) => {
                self.log_rejection(operation, actor, &error);
                return Err(Rejection::new(error));
            }
        };
        let mut entry = slot.lock().await;
        let current = self.current().await;
        let now = Utc::now();

        let outcome = authorize(&self.resolver(&current), &entry.record, now).and_then(|_| mutate(&mut *entry, now));
        let transition = match outcome {
            Ok(transition) => transition,
            Err(error) => {
                self.log_rejection(operation, actor, &error);
                return Err(Rejection::new(error).with_current(Some(CurrentState::Document(entry.record.clone()))));
            }
        };
        drop(entry);
        drop(gate);

        self.finish_transition(actor, operation, &transition, now).await;
        Ok(transition.after)
    }

    async fn finish_transition(&self, actor: UserId, operation: Operation, transition: &Transition, now: DateTime<Utc>) {
        let after = match &transition.decision {
            Some(decision) => json!({ "record": transition.after, "decision": decision }),
            None => json!({ "record": transition.after }),
        };
        self.commit(
            actor,
            operation,
            AuditTarget::Document(transition.after.id),
            &transition.before,
            after,
        )
        .await;

        if let Some(event) = NotificationEvent::for_transition(&transition.after, transition.decision.as_ref(), now) {
            self.pipeline.notify(operation, &event).await;
        }
    }

    // ========================================
    // Internals
    // ========================================

    fn resolver<'a>(&self, snapshot: &'a Snapshot) -> AuthorityResolver<'a> {
        AuthorityResolver::new(&snapshot.tree, &snapshot.grants, self.config.authority.max_delegation_depth)
    }

    async fn document_slot(&self, id: DocumentId) -> NetworkResult<DocumentSlot> {
        self.documents
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| NetworkError::not_found(format!("document {}", id)))
    }

    async fn document_slots(&self) -> Vec<DocumentSlot> {
        self.documents.read().await.values().cloned().collect()
    }

    fn verify(&self, next: &Snapshot) -> NetworkResult<()> {
        if self.config.hierarchy.verify_invariants {
            next.tree.check_invariants()?;
        }
        Ok(())
    }

    async fn publish(&self, next: Snapshot) {
        *self.snapshot.write().await = Arc::new(next);
    }

    fn reject_vendor(
        &self,
        current: &Snapshot,
        operation: Operation,
        actor: UserId,
        target: Option<VendorId>,
        error: NetworkError,
    ) -> Rejection {
        self.log_rejection(operation, actor, &error);
        let state = target
            .and_then(|id| current.tree.node(id))
            .map(|node| CurrentState::Vendor(node.clone()));
        Rejection::new(error).with_current(state)
    }

    fn log_rejection(&self, operation: Operation, actor: UserId, error: &NetworkError) {
        match error {
            NetworkError::HierarchyInvariantViolation(_) => {
                tracing::error!("{} by {} aborted: {}", operation, actor, error)
            }
            e if e.is_structural() => tracing::warn!("{} by {} rejected: {}", operation, actor, error),
            _ => tracing::debug!("{} by {} rejected: {}", operation, actor, error),
        }
    }

    /// Log and audit one committed operation
    async fn commit<B: Serialize, A: Serialize>(
        &self,
        actor: UserId,
        operation: Operation,
        target: AuditTarget,
        before: B,
        after: A,
    ) {
        tracing::info!("{} committed by {} on {}", operation, actor, target);
        let record = AuditRecord::new(
            actor,
            operation,
            target,
            audit_value(&target, "before", before),
            audit_value(&target, "after", after),
            Utc::now(),
        );
        self.pipeline.audit(&record).await;
    }
}

fn audit_value<T: Serialize>(target: &AuditTarget, side: &str, value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize audit {} state for {}: {}", side, target, e);
        Value::Null
    })
}

/// Both the actor and the target of an escalation must hold `verify_document`
/// over the owner vendor
fn authorize_verification(
    resolver: &AuthorityResolver<'_>,
    actor: UserId,
    escalatee: Option<UserId>,
    record: &DocumentRecord,
    now: DateTime<Utc>,
) -> NetworkResult<()> {
    resolver.require(actor, record.owner_vendor_id, VERIFY_DOCUMENT, now)?;
    match escalatee {
        Some(to) => resolver.require(to, record.owner_vendor_id, VERIFY_DOCUMENT, now),
        None => Ok(()),
    }
}

fn escalation_target(request: &VerificationRequest) -> Option<UserId> {
    match request.action {
        VerificationAction::Escalated => request.escalated_to_id,
        _ => None,
    }
}
