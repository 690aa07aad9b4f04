// Nested-interval vendor tree: O(1) relationship checks, renumbering on mutation
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use crate::error::{NetworkError, NetworkResult};
use crate::hierarchy::node::{Capacity, NewVendor, VendorNode, VendorStatus};
use crate::types::VendorId;

/// In-memory vendor hierarchy.
///
/// Every mutation validates its preconditions before touching any node, so a
/// failed call leaves the tree exactly as it was. Callers that need isolation
/// across several calls clone the tree, mutate the clone and publish it.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorTree {
    nodes: BTreeMap<VendorId, VendorNode>,
    // left -> id, rebuilt after every renumbering
    by_left: BTreeMap<u64, VendorId>,
    next_id: u64,
    default_capacity: Capacity,
}

impl VendorTree {
    pub fn new(default_capacity: Capacity) -> Self {
        Self {
            nodes: BTreeMap::new(),
            by_left: BTreeMap::new(),
            next_id: 1,
            default_capacity,
        }
    }

    /// Rebuild a tree from stored nodes, rejecting anything that violates the interval invariants
    pub fn from_nodes(nodes: Vec<VendorNode>, default_capacity: Capacity) -> NetworkResult<Self> {
        let next_id = nodes.iter().map(|n| n.id.0).max().unwrap_or(0) + 1;
        let mut tree = Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            by_left: BTreeMap::new(),
            next_id,
            default_capacity,
        };
        tree.reindex();
        tree.check_invariants()?;
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn default_capacity(&self) -> Capacity {
        self.default_capacity
    }

    /// Id the next inserted vendor will receive
    pub fn next_id(&self) -> VendorId {
        VendorId(self.next_id)
    }

    /// Never hand out ids below `next`, even if no live vendor holds them
    pub fn reserve_ids_below(&mut self, next: VendorId) {
        self.next_id = self.next_id.max(next.0);
    }

    pub fn root(&self) -> Option<&VendorNode> {
        self.at_left(1)
    }

    pub fn node(&self, id: VendorId) -> Option<&VendorNode> {
        self.nodes.get(&id)
    }

    pub fn get(&self, id: VendorId) -> NetworkResult<&VendorNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| NetworkError::not_found(format!("vendor {}", id)))
    }

    /// All nodes in pre-order (ascending `left`)
    pub fn iter(&self) -> impl Iterator<Item = &VendorNode> {
        self.by_left.values().filter_map(|id| self.nodes.get(id))
    }

    fn at_left(&self, left: u64) -> Option<&VendorNode> {
        self.by_left.get(&left).and_then(|id| self.nodes.get(id))
    }

    fn reindex(&mut self) {
        self.by_left = self.nodes.values().map(|n| (n.left, n.id)).collect();
    }

    fn allocate_id(&mut self) -> VendorId {
        let id = VendorId(self.next_id);
        self.next_id += 1;
        id
    }

    fn ensure_unique_code(&self, code: &str) -> NetworkResult<()> {
        if code.trim().is_empty() {
            return Err(NetworkError::validation("vendor code must not be empty"));
        }
        if self.nodes.values().any(|n| n.code == code) {
            return Err(NetworkError::validation(format!("vendor code '{}' is already in use", code)));
        }
        Ok(())
    }

    // ========================================
    // Mutations
    // ========================================

    /// Create the single root vendor at interval [1, 2]
    pub fn insert_root(&mut self, attrs: NewVendor, now: DateTime<Utc>) -> NetworkResult<VendorId> {
        if !self.is_empty() {
            return Err(NetworkError::invalid_operation("the vendor tree already has a root"));
        }
        self.ensure_unique_code(&attrs.code)?;

        let id = self.allocate_id();
        let node = VendorNode {
            id,
            parent_id: None,
            left: 1,
            right: 2,
            level: 0,
            name: attrs.name,
            code: attrs.code,
            vendor_type: attrs.vendor_type,
            status: attrs.status.unwrap_or_default(),
            capacity: attrs.capacity.unwrap_or(self.default_capacity),
            created_at: now,
        };
        self.nodes.insert(id, node);
        self.reindex();
        Ok(id)
    }

    /// Insert a new vendor as the rightmost child of `parent_id`
    pub fn insert_child(
        &mut self,
        parent_id: VendorId,
        attrs: NewVendor,
        now: DateTime<Utc>,
    ) -> NetworkResult<VendorId> {
        let parent = self.get(parent_id)?;
        let (edge, parent_level, parent_status, limit) = (
            parent.right,
            parent.level,
            parent.status,
            parent.capacity.max_sub_vendors,
        );

        if self.active_children_of(parent) >= limit as usize {
            return Err(NetworkError::CapacityExceeded {
                vendor_id: parent_id,
                resource: "active sub-vendors".to_string(),
                limit,
            });
        }
        self.ensure_unique_code(&attrs.code)?;

        // Children of a dormant parent always start out pending
        let status = match parent_status {
            VendorStatus::Suspended | VendorStatus::Inactive => VendorStatus::Pending,
            _ => attrs.status.unwrap_or_default(),
        };

        for node in self.nodes.values_mut() {
            if node.left >= edge {
                node.left += 2;
            }
            if node.right >= edge {
                node.right += 2;
            }
        }

        let id = self.allocate_id();
        self.nodes.insert(
            id,
            VendorNode {
                id,
                parent_id: Some(parent_id),
                left: edge,
                right: edge + 1,
                level: parent_level + 1,
                name: attrs.name,
                code: attrs.code,
                vendor_type: attrs.vendor_type,
                status,
                capacity: attrs.capacity.unwrap_or(self.default_capacity),
                created_at: now,
            },
        );
        self.reindex();
        Ok(id)
    }

    /// Re-parent the subtree rooted at `node_id` as the rightmost child of `new_parent_id`
    pub fn move_subtree(&mut self, node_id: VendorId, new_parent_id: VendorId) -> NetworkResult<()> {
        let node = self.get(node_id)?.clone();
        let target = self.get(new_parent_id)?.clone();

        if node.is_root() {
            return Err(NetworkError::invalid_operation("the root vendor cannot be moved"));
        }
        if node.contains(&target) {
            return Err(NetworkError::Cycle { node_id, new_parent_id });
        }
        if node.is_active() && node.parent_id != Some(new_parent_id) {
            let limit = target.capacity.max_sub_vendors;
            if self.active_children_of(&target) >= limit as usize {
                return Err(NetworkError::CapacityExceeded {
                    vendor_id: new_parent_id,
                    resource: "active sub-vendors".to_string(),
                    limit,
                });
            }
        }

        let width = node.width();
        let (old_left, old_right) = (node.left, node.right);
        let moving: HashSet<VendorId> = self
            .by_left
            .range(old_left..=old_right)
            .map(|(_, id)| *id)
            .collect();

        // Close the gap at the old position
        for n in self.nodes.values_mut().filter(|n| !moving.contains(&n.id)) {
            if n.left > old_right {
                n.left -= width;
            }
            if n.right > old_right {
                n.right -= width;
            }
        }

        // Open a gap of the same width at the new parent's right edge
        let insert_at = self
            .nodes
            .get(&new_parent_id)
            .map(|p| p.right)
            .ok_or_else(|| NetworkError::invariant(format!("vendor {} vanished during move", new_parent_id)))?;
        for n in self.nodes.values_mut().filter(|n| !moving.contains(&n.id)) {
            if n.left >= insert_at {
                n.left += width;
            }
            if n.right >= insert_at {
                n.right += width;
            }
        }

        // Re-seat the subtree, keeping relative offsets
        let new_level = target.level + 1;
        for n in self.nodes.values_mut().filter(|n| moving.contains(&n.id)) {
            n.left = n.left - old_left + insert_at;
            n.right = n.right - old_left + insert_at;
            n.level = n.level - node.level + new_level;
            if n.id == node_id {
                n.parent_id = Some(new_parent_id);
            }
        }

        self.reindex();
        Ok(())
    }

    /// Delete `node_id` and all of its descendants, closing the gap they leave.
    ///
    /// Unless `force` is set, fails with `NotEmpty` while any descendant is
    /// active or `owned_records` reports records owned by a subtree member.
    pub fn delete_subtree<F>(
        &mut self,
        node_id: VendorId,
        force: bool,
        owned_records: F,
    ) -> NetworkResult<Vec<VendorNode>>
    where
        F: Fn(VendorId) -> usize,
    {
        let node = self.get(node_id)?.clone();
        if node.is_root() {
            return Err(NetworkError::invalid_operation("the root vendor cannot be deleted"));
        }

        let doomed: Vec<VendorId> = self
            .by_left
            .range(node.left..=node.right)
            .map(|(_, id)| *id)
            .collect();

        if !force {
            let active_descendants = doomed
                .iter()
                .filter(|id| **id != node_id)
                .filter_map(|id| self.nodes.get(id))
                .filter(|n| n.is_active())
                .count();
            let owned: usize = doomed.iter().map(|id| owned_records(*id)).sum();
            if active_descendants > 0 || owned > 0 {
                return Err(NetworkError::NotEmpty {
                    vendor_id: node_id,
                    active_descendants,
                    owned_records: owned,
                });
            }
        }

        let removed: Vec<VendorNode> = doomed
            .iter()
            .filter_map(|id| self.nodes.remove(id))
            .collect();

        let width = node.width();
        for n in self.nodes.values_mut() {
            if n.left > node.right {
                n.left -= width;
            }
            if n.right > node.right {
                n.right -= width;
            }
        }

        self.reindex();
        Ok(removed)
    }

    /// Change a vendor's status, returning the previous one.
    /// Activation counts against the parent's sub-vendor capacity.
    pub fn set_status(&mut self, id: VendorId, status: VendorStatus) -> NetworkResult<VendorStatus> {
        let node = self.get(id)?;
        if status == VendorStatus::Active && !node.is_active() {
            if let Some(parent_id) = node.parent_id {
                let parent = self.get(parent_id)?;
                let limit = parent.capacity.max_sub_vendors;
                if self.active_children_of(parent) >= limit as usize {
                    return Err(NetworkError::CapacityExceeded {
                        vendor_id: parent_id,
                        resource: "active sub-vendors".to_string(),
                        limit,
                    });
                }
            }
        }

        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| NetworkError::not_found(format!("vendor {}", id)))?;
        Ok(std::mem::replace(&mut node.status, status))
    }

    // ========================================
    // Queries (interval comparison only)
    // ========================================

    /// Ancestors ordered root first
    pub fn ancestors(&self, id: VendorId) -> NetworkResult<Vec<&VendorNode>> {
        let node = self.get(id)?;
        Ok(self
            .by_left
            .range(..node.left)
            .filter_map(|(_, aid)| self.nodes.get(aid))
            .filter(|a| a.right > node.right)
            .collect())
    }

    /// Descendants in pre-order
    pub fn descendants(&self, id: VendorId) -> NetworkResult<Vec<&VendorNode>> {
        let node = self.get(id)?;
        Ok(self
            .by_left
            .range(node.left + 1..node.right)
            .filter_map(|(_, did)| self.nodes.get(did))
            .collect())
    }

    /// Direct children, left to right
    pub fn children(&self, id: VendorId) -> NetworkResult<Vec<&VendorNode>> {
        let node = self.get(id)?;
        Ok(self.children_of(node))
    }

    // Hops from each child's right edge to the next sibling's left edge
    fn children_of(&self, node: &VendorNode) -> Vec<&VendorNode> {
        let mut out = Vec::new();
        let mut pos = node.left + 1;
        while pos < node.right {
            match self.at_left(pos) {
                Some(child) => {
                    out.push(child);
                    pos = child.right + 1;
                }
                None => break,
            }
        }
        out
    }

    fn active_children_of(&self, node: &VendorNode) -> usize {
        self.children_of(node).iter().filter(|c| c.is_active()).count()
    }

    pub fn active_child_count(&self, id: VendorId) -> NetworkResult<usize> {
        let node = self.get(id)?;
        Ok(self.active_children_of(node))
    }

    pub fn is_ancestor_of(&self, ancestor: VendorId, descendant: VendorId) -> NetworkResult<bool> {
        let a = self.get(ancestor)?;
        let b = self.get(descendant)?;
        Ok(a.is_ancestor_of(b))
    }

    /// Full structural check. Runs in O(n log n) with a stack of open intervals.
    pub fn check_invariants(&self) -> NetworkResult<()> {
        if self.by_left.len() != self.nodes.len() {
            return Err(NetworkError::invariant("left-edge index is out of sync with nodes"));
        }
        if self.nodes.is_empty() {
            return Ok(());
        }

        let mut positions: Vec<u64> = Vec::with_capacity(self.nodes.len() * 2);
        let mut open: Vec<&VendorNode> = Vec::new();
        let mut roots = 0usize;

        for (left, id) in &self.by_left {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| NetworkError::invariant(format!("index points at missing vendor {}", id)))?;

            if node.left != *left {
                return Err(NetworkError::invariant(format!("vendor {} indexed under stale left edge", id)));
            }
            if node.left >= node.right || (node.right - node.left) % 2 == 0 {
                return Err(NetworkError::invariant(format!(
                    "vendor {} has malformed interval [{}, {}]",
                    id, node.left, node.right
                )));
            }

            while let Some(top) = open.last() {
                if top.right < node.left {
                    open.pop();
                } else {
                    break;
                }
            }

            match open.last() {
                Some(parent) => {
                    if node.right >= parent.right {
                        return Err(NetworkError::invariant(format!(
                            "vendor {} overlaps vendor {}",
                            id, parent.id
                        )));
                    }
                    if node.parent_id != Some(parent.id) {
                        return Err(NetworkError::invariant(format!(
                            "vendor {} is nested in {} but points at {:?}",
                            id, parent.id, node.parent_id
                        )));
                    }
                    if node.level != parent.level + 1 {
                        return Err(NetworkError::invariant(format!(
                            "vendor {} has level {}, expected {}",
                            id,
                            node.level,
                            parent.level + 1
                        )));
                    }
                }
                None => {
                    roots += 1;
                    if node.parent_id.is_some() || node.level != 0 {
                        return Err(NetworkError::invariant(format!(
                            "vendor {} sits at the top level but is not a root",
                            id
                        )));
                    }
                }
            }

            open.push(node);
            positions.push(node.left);
            positions.push(node.right);
        }

        if roots != 1 {
            return Err(NetworkError::invariant(format!("expected one root, found {}", roots)));
        }

        // Edges must be exactly 1..=2n; together with proper nesting this makes
        // (right - left - 1) / 2 equal the descendant count.
        positions.sort_unstable();
        for (i, p) in positions.iter().enumerate() {
            if *p != i as u64 + 1 {
                return Err(NetworkError::invariant(format!("interval edges are not compact at {}", p)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::node::VendorType;

    fn capacity() -> Capacity {
        Capacity { max_sub_vendors: 5, max_drivers: 10, max_vehicles: 10 }
    }

    fn vendor(code: &str, vendor_type: VendorType) -> NewVendor {
        NewVendor::new(format!("Vendor {}", code), code, vendor_type)
    }

    fn interval(tree: &VendorTree, id: VendorId) -> (u64, u64, u32) {
        let n = tree.get(id).unwrap();
        (n.left, n.right, n.level)
    }

    #[test]
    fn test_root_child_grandchild_numbering() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        assert_eq!(interval(&tree, s), (1, 2, 0));

        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        assert_eq!(interval(&tree, s), (1, 4, 0));
        assert_eq!(interval(&tree, r), (2, 3, 1));

        let c = tree.insert_child(r, vendor("C", VendorType::City), now).unwrap();
        assert_eq!(interval(&tree, s), (1, 6, 0));
        assert_eq!(interval(&tree, r), (2, 5, 1));
        assert_eq!(interval(&tree, c), (3, 4, 2));

        assert!(tree.is_ancestor_of(s, c).unwrap());
        let children: Vec<VendorId> = tree.children(s).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(children, vec![r]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_second_root_rejected() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let err = tree.insert_root(vendor("T", VendorType::Super), now).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidOperation(_)));
    }

    #[test]
    fn test_children_keep_creation_order() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let a = tree.insert_child(s, vendor("A", VendorType::Regional), now).unwrap();
        let b = tree.insert_child(s, vendor("B", VendorType::Regional), now).unwrap();
        let c = tree.insert_child(s, vendor("C", VendorType::Regional), now).unwrap();
        let ids: Vec<VendorId> = tree.children(s).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_capacity_counts_only_active_children() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let root = tree
            .insert_root(
                vendor("S", VendorType::Super).with_capacity(Capacity { max_sub_vendors: 1, ..capacity() }),
                now,
            )
            .unwrap();
        // Pending children do not consume capacity
        tree.insert_child(root, vendor("P1", VendorType::Regional), now).unwrap();
        tree.insert_child(root, vendor("A1", VendorType::Regional).active(), now).unwrap();
        let err = tree
            .insert_child(root, vendor("A2", VendorType::Regional).active(), now)
            .unwrap_err();
        assert!(matches!(err, NetworkError::CapacityExceeded { limit: 1, .. }));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.active_child_count(root).unwrap(), 1);
    }

    #[test]
    fn test_activation_respects_parent_capacity() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let root = tree
            .insert_root(
                vendor("S", VendorType::Super).with_capacity(Capacity { max_sub_vendors: 1, ..capacity() }),
                now,
            )
            .unwrap();
        tree.insert_child(root, vendor("A", VendorType::Regional).active(), now).unwrap();
        let pending = tree.insert_child(root, vendor("B", VendorType::Regional), now).unwrap();
        assert!(matches!(
            tree.set_status(pending, VendorStatus::Active),
            Err(NetworkError::CapacityExceeded { .. })
        ));
        assert_eq!(tree.get(pending).unwrap().status, VendorStatus::Pending);
    }

    #[test]
    fn test_child_of_suspended_parent_is_pending() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super).active(), now).unwrap();
        tree.set_status(s, VendorStatus::Suspended).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional).active(), now).unwrap();
        assert_eq!(tree.get(r).unwrap().status, VendorStatus::Pending);
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let err = tree.insert_child(s, vendor("S", VendorType::Regional), now).unwrap_err();
        assert!(matches!(err, NetworkError::Validation(_)));
    }

    #[test]
    fn test_move_subtree_renumbers_and_relevels() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r1 = tree.insert_child(s, vendor("R1", VendorType::Regional), now).unwrap();
        let r2 = tree.insert_child(s, vendor("R2", VendorType::Regional), now).unwrap();
        let c = tree.insert_child(r1, vendor("C", VendorType::City), now).unwrap();
        let l = tree.insert_child(c, vendor("L", VendorType::Local), now).unwrap();

        tree.move_subtree(c, r2).unwrap();
        tree.check_invariants().unwrap();

        assert_eq!(interval(&tree, s), (1, 10, 0));
        assert_eq!(interval(&tree, r1), (2, 3, 1));
        assert_eq!(interval(&tree, r2), (4, 9, 1));
        assert_eq!(interval(&tree, c), (5, 8, 2));
        assert_eq!(interval(&tree, l), (6, 7, 3));
        assert_eq!(tree.get(c).unwrap().parent_id, Some(r2));
    }

    #[test]
    fn test_move_up_a_level() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        let c = tree.insert_child(r, vendor("C", VendorType::City), now).unwrap();
        let l = tree.insert_child(c, vendor("L", VendorType::Local), now).unwrap();

        tree.move_subtree(l, s).unwrap();
        tree.check_invariants().unwrap();
        assert_eq!(tree.get(l).unwrap().level, 1);
        let children: Vec<VendorId> = tree.children(s).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(children, vec![r, l]);
    }

    #[test]
    fn test_move_into_own_subtree_is_cycle() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        let c = tree.insert_child(r, vendor("C", VendorType::City), now).unwrap();
        let before = tree.clone();

        assert!(matches!(tree.move_subtree(r, c), Err(NetworkError::Cycle { .. })));
        assert!(matches!(tree.move_subtree(r, r), Err(NetworkError::Cycle { .. })));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_move_root_is_invalid() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        let before = tree.clone();

        assert!(matches!(tree.move_subtree(s, r), Err(NetworkError::InvalidOperation(_))));
        assert!(matches!(tree.move_subtree(s, s), Err(NetworkError::InvalidOperation(_))));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_delete_closes_gap() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r1 = tree.insert_child(s, vendor("R1", VendorType::Regional), now).unwrap();
        let r2 = tree.insert_child(s, vendor("R2", VendorType::Regional), now).unwrap();
        tree.insert_child(r1, vendor("C", VendorType::City), now).unwrap();

        let removed = tree.delete_subtree(r1, false, |_| 0).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(interval(&tree, s), (1, 4, 0));
        assert_eq!(interval(&tree, r2), (2, 3, 1));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_requires_force_when_occupied() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        let c = tree.insert_child(r, vendor("C", VendorType::City).active(), now).unwrap();

        let err = tree.delete_subtree(r, false, |_| 0).unwrap_err();
        assert!(matches!(err, NetworkError::NotEmpty { active_descendants: 1, .. }));

        tree.set_status(c, VendorStatus::Inactive).unwrap();
        let err = tree.delete_subtree(r, false, |id| usize::from(id == c)).unwrap_err();
        assert!(matches!(err, NetworkError::NotEmpty { owned_records: 1, .. }));

        tree.delete_subtree(r, true, |_| 3).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_delete_root_is_invalid() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        assert!(matches!(tree.delete_subtree(s, true, |_| 0), Err(NetworkError::InvalidOperation(_))));
    }

    #[test]
    fn test_ancestors_and_descendants_by_interval() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        let r2 = tree.insert_child(s, vendor("R2", VendorType::Regional), now).unwrap();
        let c = tree.insert_child(r, vendor("C", VendorType::City), now).unwrap();

        let ancestors: Vec<VendorId> = tree.ancestors(c).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ancestors, vec![s, r]);
        let descendants: Vec<VendorId> = tree.descendants(s).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(descendants, vec![r, c, r2]);
        assert!(!tree.is_ancestor_of(r2, c).unwrap());
        assert!(!tree.is_ancestor_of(c, c).unwrap());
    }

    #[test]
    fn test_invariant_check_detects_corruption() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        let r = tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        tree.nodes.get_mut(&r).unwrap().level = 4;
        assert!(matches!(
            tree.check_invariants(),
            Err(NetworkError::HierarchyInvariantViolation(_))
        ));
    }

    #[test]
    fn test_from_nodes_round_trip() {
        let now = Utc::now();
        let mut tree = VendorTree::new(capacity());
        let s = tree.insert_root(vendor("S", VendorType::Super), now).unwrap();
        tree.insert_child(s, vendor("R", VendorType::Regional), now).unwrap();
        let nodes: Vec<VendorNode> = tree.iter().cloned().collect();
        let mut restored = VendorTree::from_nodes(nodes, capacity()).unwrap();
        let next = restored.insert_child(s, vendor("R2", VendorType::Regional), now).unwrap();
        assert_eq!(next, VendorId(3));
    }
}
