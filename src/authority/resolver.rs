// Resolves effective permissions from grants propagated down the vendor tree
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::authority::grant::{GrantSet, GrantSource, PermissionGrant};
use crate::error::{DenialReason, NetworkError, NetworkResult};
use crate::hierarchy::VendorTree;
use crate::types::{GrantId, UserId, VendorId};

/// Outcome of an authority check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Authority {
    /// `grant_id` is `None` for the system principal
    Granted { grant_id: Option<GrantId>, scope: VendorId },
    Denied { reason: DenialReason },
}

impl Authority {
    pub fn is_granted(&self) -> bool {
        matches!(self, Authority::Granted { .. })
    }

    pub fn into_result(self) -> NetworkResult<()> {
        match self {
            Authority::Granted { .. } => Ok(()),
            Authority::Denied { reason } => Err(NetworkError::denied(reason)),
        }
    }

    fn denied(reason: DenialReason) -> Self {
        Authority::Denied { reason }
    }
}

/// Read-only view over one committed snapshot of the tree and grant set.
///
/// Borrowing both from the same snapshot is what keeps a check and the
/// mutation that depends on it consistent.
pub struct AuthorityResolver<'a> {
    tree: &'a VendorTree,
    grants: &'a GrantSet,
    max_delegation_depth: usize,
}

impl<'a> AuthorityResolver<'a> {
    pub fn new(tree: &'a VendorTree, grants: &'a GrantSet, max_delegation_depth: usize) -> Self {
        Self {
            tree,
            grants,
            max_delegation_depth,
        }
    }

    /// Resolve `code` for `user` at `vendor`.
    ///
    /// Grants on the vendor or any ancestor apply; among unexpired ones the
    /// deepest wins. A delegated grant only holds while its grantor could
    /// still delegate the same code at that scope.
    pub fn resolve(
        &self,
        user: UserId,
        vendor: VendorId,
        code: &str,
        now: DateTime<Utc>,
    ) -> NetworkResult<Authority> {
        let mut visited = HashSet::new();
        self.resolve_at(user, vendor, code, now, &mut visited, 0)
    }

    /// Like `resolve`, but a denial becomes `AuthorityDenied`
    pub fn require(&self, user: UserId, vendor: VendorId, code: &str, now: DateTime<Utc>) -> NetworkResult<()> {
        let authority = self.resolve(user, vendor, code, now)?;
        if let Authority::Denied { reason } = authority {
            tracing::debug!("Authority denied: user={} vendor={} code={} reason={}", user, vendor, code, reason);
        }
        authority.into_result()
    }

    /// Whether `user` may re-grant `code` at `vendor`
    pub fn resolve_delegation(
        &self,
        user: UserId,
        vendor: VendorId,
        code: &str,
        now: DateTime<Utc>,
    ) -> NetworkResult<Authority> {
        match self.resolve(user, vendor, code, now)? {
            Authority::Granted { grant_id: None, scope } => Ok(Authority::Granted { grant_id: None, scope }),
            Authority::Granted { grant_id: Some(id), scope } => {
                if self.grants.get(id).map_or(false, |g| g.can_delegate) {
                    Ok(Authority::Granted { grant_id: Some(id), scope })
                } else {
                    Ok(Authority::denied(DenialReason::DelegationNotAllowed))
                }
            }
            Authority::Denied { reason } => Ok(Authority::denied(reason)),
        }
    }

    /// Every code that resolves to `Granted` for `user` at `vendor`, sorted
    pub fn effective_permissions(
        &self,
        user: UserId,
        vendor: VendorId,
        now: DateTime<Utc>,
    ) -> NetworkResult<Vec<String>> {
        let target = self.tree.get(vendor)?;
        let codes: BTreeSet<&str> = self
            .grants
            .for_user(user)
            .filter(|g| self.tree.node(g.vendor_id).map_or(false, |n| n.contains(target)))
            .map(|g| g.permission_code.as_str())
            .collect();

        let mut granted = Vec::new();
        for code in codes {
            if self.resolve(user, vendor, code, now)?.is_granted() {
                granted.push(code.to_string());
            }
        }
        Ok(granted)
    }

    fn resolve_at(
        &self,
        user: UserId,
        vendor: VendorId,
        code: &str,
        now: DateTime<Utc>,
        visited: &mut HashSet<UserId>,
        depth: usize,
    ) -> NetworkResult<Authority> {
        let target = self.tree.get(vendor)?;
        if user.is_system() {
            return Ok(Authority::Granted { grant_id: None, scope: vendor });
        }

        let candidates: Vec<(&PermissionGrant, u32)> = self
            .grants
            .for_user_code(user, code)
            .filter_map(|g| self.tree.node(g.vendor_id).map(|n| (g, n)))
            .filter(|(_, n)| n.contains(target))
            .map(|(g, n)| (g, n.level))
            .collect();

        if candidates.is_empty() {
            return Ok(Authority::denied(DenialReason::NoGrant));
        }

        let effective = candidates
            .iter()
            .filter(|(g, _)| !g.is_expired(now))
            .max_by_key(|(_, level)| *level)
            .map(|(g, _)| *g);

        let grant = match effective {
            Some(grant) => grant,
            None => return Ok(Authority::denied(DenialReason::Expired)),
        };

        match grant.source {
            GrantSource::Organizational => Ok(Authority::Granted {
                grant_id: Some(grant.id),
                scope: grant.vendor_id,
            }),
            GrantSource::Delegated => {
                if depth >= self.max_delegation_depth || !visited.insert(user) {
                    return Ok(Authority::denied(DenialReason::DelegationNotAllowed));
                }
                let upstream = self.resolve_at(grant.granted_by, grant.vendor_id, code, now, visited, depth + 1)?;
                let grantor_can_delegate = match upstream {
                    Authority::Granted { grant_id: None, .. } => true,
                    Authority::Granted { grant_id: Some(id), .. } => {
                        self.grants.get(id).map_or(false, |g| g.can_delegate)
                    }
                    Authority::Denied { .. } => false,
                };
                if grantor_can_delegate {
                    Ok(Authority::Granted {
                        grant_id: Some(grant.id),
                        scope: grant.vendor_id,
                    })
                } else {
                    Ok(Authority::denied(DenialReason::DelegationNotAllowed))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::grant::NewGrant;
    use crate::authority::VERIFY_DOCUMENT;
    use crate::hierarchy::{Capacity, NewVendor, VendorType};
    use chrono::Duration;

    struct Fixture {
        tree: VendorTree,
        grants: GrantSet,
        root: VendorId,
        region: VendorId,
        city: VendorId,
        other_region: VendorId,
    }

    fn fixture() -> Fixture {
        let now = Utc::now();
        let mut tree = VendorTree::new(Capacity { max_sub_vendors: 5, max_drivers: 5, max_vehicles: 5 });
        let root = tree.insert_root(NewVendor::new("Root", "S", VendorType::Super), now).unwrap();
        let region = tree.insert_child(root, NewVendor::new("North", "R1", VendorType::Regional), now).unwrap();
        let city = tree.insert_child(region, NewVendor::new("Oslo", "C1", VendorType::City), now).unwrap();
        let other_region = tree.insert_child(root, NewVendor::new("South", "R2", VendorType::Regional), now).unwrap();
        Fixture { tree, grants: GrantSet::new(), root, region, city, other_region }
    }

    fn add(grants: &mut GrantSet, grant: NewGrant, by: UserId) -> GrantId {
        let grant = grant.into_grant(by, Utc::now());
        let id = grant.id;
        grants.insert(grant).unwrap();
        id
    }

    #[test]
    fn test_grant_propagates_down_not_sideways() {
        let mut f = fixture();
        let user = UserId::new();
        add(&mut f.grants, NewGrant::organizational(f.region, user, VERIFY_DOCUMENT), UserId::SYSTEM);
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        let now = Utc::now();

        assert!(resolver.resolve(user, f.city, VERIFY_DOCUMENT, now).unwrap().is_granted());
        assert!(resolver.resolve(user, f.region, VERIFY_DOCUMENT, now).unwrap().is_granted());
        assert_eq!(
            resolver.resolve(user, f.other_region, VERIFY_DOCUMENT, now).unwrap(),
            Authority::Denied { reason: DenialReason::NoGrant }
        );
        assert_eq!(
            resolver.resolve(user, f.root, VERIFY_DOCUMENT, now).unwrap(),
            Authority::Denied { reason: DenialReason::NoGrant }
        );
    }

    #[test]
    fn test_expired_grant_is_denied_as_expired() {
        let mut f = fixture();
        let user = UserId::new();
        let now = Utc::now();
        add(
            &mut f.grants,
            NewGrant::organizational(f.region, user, VERIFY_DOCUMENT).expiring(now - Duration::minutes(1)),
            UserId::SYSTEM,
        );
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert_eq!(
            resolver.resolve(user, f.city, VERIFY_DOCUMENT, now).unwrap(),
            Authority::Denied { reason: DenialReason::Expired }
        );
    }

    #[test]
    fn test_deeper_grant_overrides_ancestor() {
        let mut f = fixture();
        let user = UserId::new();
        add(&mut f.grants, NewGrant::organizational(f.root, user, VERIFY_DOCUMENT), UserId::SYSTEM);
        let deep = add(&mut f.grants, NewGrant::organizational(f.city, user, VERIFY_DOCUMENT), UserId::SYSTEM);
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        match resolver.resolve(user, f.city, VERIFY_DOCUMENT, Utc::now()).unwrap() {
            Authority::Granted { grant_id, scope } => {
                assert_eq!(grant_id, Some(deep));
                assert_eq!(scope, f.city);
            }
            other => panic!("expected grant, got {:?}", other),
        }
    }

    #[test]
    fn test_delegation_requires_grantor_can_delegate() {
        let mut f = fixture();
        let manager = UserId::new();
        let clerk = UserId::new();
        add(&mut f.grants, NewGrant::organizational(f.region, manager, VERIFY_DOCUMENT), UserId::SYSTEM);
        add(&mut f.grants, NewGrant::delegated(f.city, clerk, VERIFY_DOCUMENT), manager);
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert_eq!(
            resolver.resolve(clerk, f.city, VERIFY_DOCUMENT, Utc::now()).unwrap(),
            Authority::Denied { reason: DenialReason::DelegationNotAllowed }
        );
    }

    #[test]
    fn test_delegation_chain_honoured() {
        let mut f = fixture();
        let manager = UserId::new();
        let lead = UserId::new();
        let clerk = UserId::new();
        add(&mut f.grants, NewGrant::organizational(f.region, manager, VERIFY_DOCUMENT).delegable(), UserId::SYSTEM);
        add(&mut f.grants, NewGrant::delegated(f.region, lead, VERIFY_DOCUMENT).delegable(), manager);
        add(&mut f.grants, NewGrant::delegated(f.city, clerk, VERIFY_DOCUMENT), lead);
        let now = Utc::now();

        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert!(resolver.resolve(clerk, f.city, VERIFY_DOCUMENT, now).unwrap().is_granted());

        // A chain longer than the configured depth is not honoured
        let shallow = AuthorityResolver::new(&f.tree, &f.grants, 1);
        assert_eq!(
            shallow.resolve(clerk, f.city, VERIFY_DOCUMENT, now).unwrap(),
            Authority::Denied { reason: DenialReason::DelegationNotAllowed }
        );
    }

    #[test]
    fn test_circular_delegation_denied() {
        let mut f = fixture();
        let a = UserId::new();
        let b = UserId::new();
        add(&mut f.grants, NewGrant::delegated(f.region, a, VERIFY_DOCUMENT).delegable(), b);
        add(&mut f.grants, NewGrant::delegated(f.region, b, VERIFY_DOCUMENT).delegable(), a);
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert_eq!(
            resolver.resolve(a, f.city, VERIFY_DOCUMENT, Utc::now()).unwrap(),
            Authority::Denied { reason: DenialReason::DelegationNotAllowed }
        );
    }

    #[test]
    fn test_system_principal_always_granted() {
        let f = fixture();
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert!(resolver.resolve(UserId::SYSTEM, f.city, "anything", Utc::now()).unwrap().is_granted());
    }

    #[test]
    fn test_effective_permissions_lists_granted_codes() {
        let mut f = fixture();
        let user = UserId::new();
        let now = Utc::now();
        add(&mut f.grants, NewGrant::organizational(f.root, user, "upload_document"), UserId::SYSTEM);
        add(&mut f.grants, NewGrant::organizational(f.region, user, VERIFY_DOCUMENT), UserId::SYSTEM);
        add(
            &mut f.grants,
            NewGrant::organizational(f.region, user, "manage_documents").expiring(now - Duration::days(1)),
            UserId::SYSTEM,
        );
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert_eq!(
            resolver.effective_permissions(user, f.city, now).unwrap(),
            vec!["upload_document".to_string(), VERIFY_DOCUMENT.to_string()]
        );
        assert_eq!(
            resolver.effective_permissions(user, f.other_region, now).unwrap(),
            vec!["upload_document".to_string()]
        );
    }

    #[test]
    fn test_unknown_vendor_is_not_found() {
        let f = fixture();
        let resolver = AuthorityResolver::new(&f.tree, &f.grants, 8);
        assert!(matches!(
            resolver.resolve(UserId::new(), VendorId(99), VERIFY_DOCUMENT, Utc::now()),
            Err(NetworkError::NotFound(_))
        ));
    }
}
