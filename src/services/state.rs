// Serializable snapshot of the whole network, used for persistence by the CLI
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::authority::{GrantSet, PermissionGrant};
use crate::error::{NetworkError, NetworkResult};
use crate::hierarchy::{AssetKind, Capacity, VendorNode, VendorTree};
use crate::types::VendorId;
use crate::workflow::{DocumentEntry, DocumentTypeSpec};

/// Driver and vehicle counts attached to one vendor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCounts {
    pub drivers: u32,
    pub vehicles: u32,
}

impl AssetCounts {
    pub fn get(&self, kind: AssetKind) -> u32 {
        match kind {
            AssetKind::Driver => self.drivers,
            AssetKind::Vehicle => self.vehicles,
        }
    }

    pub fn get_mut(&mut self, kind: AssetKind) -> &mut u32 {
        match kind {
            AssetKind::Driver => &mut self.drivers,
            AssetKind::Vehicle => &mut self.vehicles,
        }
    }

    pub fn total(&self) -> usize {
        self.drivers as usize + self.vehicles as usize
    }
}

/// Committed tree, grants and asset counts. Replaced whole on every structural change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tree: VendorTree,
    pub grants: GrantSet,
    pub assets: BTreeMap<VendorId, AssetCounts>,
}

impl Snapshot {
    pub fn empty(default_capacity: Capacity) -> Self {
        Self {
            tree: VendorTree::new(default_capacity),
            grants: GrantSet::new(),
            assets: BTreeMap::new(),
        }
    }

    pub fn assets_of(&self, vendor: VendorId) -> AssetCounts {
        self.assets.get(&vendor).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub vendor_id: VendorId,
    #[serde(flatten)]
    pub counts: AssetCounts,
}

/// Everything needed to rebuild a `VendorNetwork`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub exported_at: DateTime<Utc>,
    /// Id counter of the tree, so ids of deleted vendors are not reused
    #[serde(default)]
    pub next_vendor_id: Option<VendorId>,
    #[serde(default)]
    pub vendors: Vec<VendorNode>,
    #[serde(default)]
    pub grants: Vec<PermissionGrant>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    #[serde(default)]
    pub document_types: Vec<DocumentTypeSpec>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

impl NetworkState {
    pub fn empty() -> Self {
        Self {
            exported_at: Utc::now(),
            next_vendor_id: None,
            vendors: Vec::new(),
            grants: Vec::new(),
            assets: Vec::new(),
            document_types: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Rebuild and validate the structural part
    pub fn to_snapshot(&self, default_capacity: Capacity) -> NetworkResult<Snapshot> {
        let mut tree = VendorTree::from_nodes(self.vendors.clone(), default_capacity)?;
        if let Some(next) = self.next_vendor_id {
            tree.reserve_ids_below(next);
        }

        for grant in &self.grants {
            if tree.node(grant.vendor_id).is_none() {
                return Err(NetworkError::validation(format!(
                    "grant {} refers to unknown vendor {}",
                    grant.id, grant.vendor_id
                )));
            }
        }
        let grants = GrantSet::from_grants(self.grants.clone())?;

        let mut assets = BTreeMap::new();
        for entry in &self.assets {
            if tree.node(entry.vendor_id).is_none() {
                return Err(NetworkError::validation(format!(
                    "asset counts refer to unknown vendor {}",
                    entry.vendor_id
                )));
            }
            assets.insert(entry.vendor_id, entry.counts);
        }

        Ok(Snapshot { tree, grants, assets })
    }

    pub fn from_snapshot(
        snapshot: &Snapshot,
        document_types: Vec<DocumentTypeSpec>,
        documents: Vec<DocumentEntry>,
    ) -> Self {
        Self {
            exported_at: Utc::now(),
            next_vendor_id: Some(snapshot.tree.next_id()),
            vendors: snapshot.tree.iter().cloned().collect(),
            grants: snapshot.grants.iter().cloned().collect(),
            assets: snapshot
                .assets
                .iter()
                .filter(|(_, counts)| counts.total() > 0)
                .map(|(vendor_id, counts)| AssetEntry {
                    vendor_id: *vendor_id,
                    counts: *counts,
                })
                .collect(),
            document_types,
            documents,
        }
    }
}
