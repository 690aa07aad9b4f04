use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{NetworkError, NetworkResult};
use crate::types::{GrantId, UserId, VendorId};

/// How a grant came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// Assigned by someone holding `manage_permissions` over the scope
    Organizational,
    /// Re-granted by a holder of the same code with `can_delegate`
    Delegated,
}

/// A permission code held by a user over a vendor subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: GrantId,
    pub vendor_id: VendorId,
    pub user_id: UserId,
    pub permission_code: String,
    pub can_delegate: bool,
    pub is_temporary: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: UserId,
    pub source: GrantSource,
    pub granted_at: DateTime<Utc>,
}

impl PermissionGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_temporary && self.expires_at.map_or(false, |at| at < now)
    }
}

/// Request to create a grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrant {
    pub vendor_id: VendorId,
    pub user_id: UserId,
    pub permission_code: String,
    #[serde(default)]
    pub can_delegate: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub source: GrantSource,
}

impl NewGrant {
    pub fn organizational(vendor_id: VendorId, user_id: UserId, code: impl Into<String>) -> Self {
        Self {
            vendor_id,
            user_id,
            permission_code: code.into(),
            can_delegate: false,
            expires_at: None,
            source: GrantSource::Organizational,
        }
    }

    pub fn delegated(vendor_id: VendorId, user_id: UserId, code: impl Into<String>) -> Self {
        Self {
            source: GrantSource::Delegated,
            ..Self::organizational(vendor_id, user_id, code)
        }
    }

    pub fn delegable(mut self) -> Self {
        self.can_delegate = true;
        self
    }

    pub fn expiring(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn into_grant(self, granted_by: UserId, now: DateTime<Utc>) -> PermissionGrant {
        PermissionGrant {
            id: GrantId::new(),
            vendor_id: self.vendor_id,
            user_id: self.user_id,
            permission_code: self.permission_code,
            can_delegate: self.can_delegate,
            is_temporary: self.expires_at.is_some(),
            expires_at: self.expires_at,
            granted_by,
            source: self.source,
            granted_at: now,
        }
    }
}

/// The committed set of grants, unique per (vendor, user, code)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantSet {
    grants: BTreeMap<GrantId, PermissionGrant>,
}

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_grants(grants: Vec<PermissionGrant>) -> NetworkResult<Self> {
        let mut set = Self::new();
        for grant in grants {
            set.insert(grant)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn get(&self, id: GrantId) -> Option<&PermissionGrant> {
        self.grants.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.grants.values()
    }

    pub fn find(&self, vendor_id: VendorId, user_id: UserId, code: &str) -> Option<&PermissionGrant> {
        self.grants
            .values()
            .find(|g| g.vendor_id == vendor_id && g.user_id == user_id && g.permission_code == code)
    }

    pub fn for_user<'a>(&'a self, user_id: UserId) -> impl Iterator<Item = &'a PermissionGrant> + 'a {
        self.grants.values().filter(move |g| g.user_id == user_id)
    }

    pub fn for_user_code<'a>(
        &'a self,
        user_id: UserId,
        code: &'a str,
    ) -> impl Iterator<Item = &'a PermissionGrant> + 'a {
        self.for_user(user_id).filter(move |g| g.permission_code == code)
    }

    pub fn for_vendor<'a>(&'a self, vendor_id: VendorId) -> impl Iterator<Item = &'a PermissionGrant> + 'a {
        self.grants.values().filter(move |g| g.vendor_id == vendor_id)
    }

    pub fn insert(&mut self, grant: PermissionGrant) -> NetworkResult<()> {
        if grant.permission_code.trim().is_empty() {
            return Err(NetworkError::validation("permission code must not be empty"));
        }
        if self.find(grant.vendor_id, grant.user_id, &grant.permission_code).is_some() {
            return Err(NetworkError::validation(format!(
                "user {} already holds '{}' on vendor {}",
                grant.user_id, grant.permission_code, grant.vendor_id
            )));
        }
        self.grants.insert(grant.id, grant);
        Ok(())
    }

    pub fn remove(&mut self, id: GrantId) -> NetworkResult<PermissionGrant> {
        self.grants
            .remove(&id)
            .ok_or_else(|| NetworkError::not_found(format!("grant {}", id)))
    }

    /// Cascade for deleted vendors
    pub fn remove_for_vendors(&mut self, vendors: &HashSet<VendorId>) -> Vec<PermissionGrant> {
        let doomed: Vec<GrantId> = self
            .grants
            .values()
            .filter(|g| vendors.contains(&g.vendor_id))
            .map(|g| g.id)
            .collect();
        doomed.into_iter().filter_map(|id| self.grants.remove(&id)).collect()
    }
}
