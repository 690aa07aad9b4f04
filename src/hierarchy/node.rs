use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::VendorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorType {
    Super,
    Regional,
    City,
    Local,
}

impl VendorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Super => "super",
            VendorType::Regional => "regional",
            VendorType::City => "city",
            VendorType::Local => "local",
        }
    }
}

impl std::str::FromStr for VendorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "super" | "super_vendor" => Ok(VendorType::Super),
            "regional" | "regional_vendor" => Ok(VendorType::Regional),
            "city" | "city_vendor" => Ok(VendorType::City),
            "local" | "local_vendor" => Ok(VendorType::Local),
            other => Err(format!("unknown vendor type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Active,
    Inactive,
    Suspended,
    #[default]
    Pending,
}

impl VendorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Active => "active",
            VendorStatus::Inactive => "inactive",
            VendorStatus::Suspended => "suspended",
            VendorStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VendorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(VendorStatus::Active),
            "inactive" => Ok(VendorStatus::Inactive),
            "suspended" => Ok(VendorStatus::Suspended),
            "pending" => Ok(VendorStatus::Pending),
            other => Err(format!("unknown vendor status '{}'", other)),
        }
    }
}

/// Operational limits of a vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub max_sub_vendors: u32,
    pub max_drivers: u32,
    pub max_vehicles: u32,
}

/// Externally owned records whose per-vendor count is capped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Driver,
    Vehicle,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Driver => "drivers",
            AssetKind::Vehicle => "vehicles",
        }
    }

    pub fn limit(&self, capacity: &Capacity) -> u32 {
        match self {
            AssetKind::Driver => capacity.max_drivers,
            AssetKind::Vehicle => capacity.max_vehicles,
        }
    }
}

impl std::str::FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "driver" | "drivers" => Ok(AssetKind::Driver),
            "vehicle" | "vehicles" => Ok(AssetKind::Vehicle),
            other => Err(format!("unknown asset kind '{}'", other)),
        }
    }
}

/// A vendor in the nested-interval tree.
///
/// `left`/`right` bracket the intervals of every descendant; `level` is the
/// number of ancestors. All three are owned by `VendorTree` and only change
/// through its mutation methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorNode {
    pub id: VendorId,
    pub parent_id: Option<VendorId>,
    pub left: u64,
    pub right: u64,
    pub level: u32,
    pub name: String,
    pub code: String,
    pub vendor_type: VendorType,
    pub status: VendorStatus,
    pub capacity: Capacity,
    pub created_at: DateTime<Utc>,
}

impl VendorNode {
    /// Strict interval containment; a node is never its own ancestor
    pub fn is_ancestor_of(&self, other: &VendorNode) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Self or descendant
    pub fn contains(&self, other: &VendorNode) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    /// Interval width, i.e. 2 * subtree size
    pub fn width(&self) -> u64 {
        self.right - self.left + 1
    }

    pub fn descendant_count(&self) -> u64 {
        (self.right - self.left - 1) / 2
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status == VendorStatus::Active
    }
}

/// Attributes supplied when creating a vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendor {
    pub name: String,
    pub code: String,
    pub vendor_type: VendorType,
    #[serde(default)]
    pub status: Option<VendorStatus>,
    #[serde(default)]
    pub capacity: Option<Capacity>,
}

impl NewVendor {
    pub fn new(name: impl Into<String>, code: impl Into<String>, vendor_type: VendorType) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            vendor_type,
            status: None,
            capacity: None,
        }
    }

    pub fn with_status(mut self, status: VendorStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn active(self) -> Self {
        self.with_status(VendorStatus::Active)
    }
}
