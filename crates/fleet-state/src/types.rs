//! Record types for the fleet state store.
//!
//! These are the raw, unmerged records: one per node, one per group and a
//! singleton defaults map. All types are serializable to/from JSON for
//! storage in redb tables.

use std::collections::BTreeMap;

use fleet_core::AttrMap;
use serde::{Deserialize, Serialize};

// ── Node ──────────────────────────────────────────────────────────

/// Raw configuration record of a single node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    #[serde(default)]
    pub name: String,
    /// Group memberships. Order is override precedence: later wins.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub attributes: AttrMap,
    #[serde(default, skip_serializing_if = "NodeStatus::is_empty")]
    pub status: NodeStatus,
}

/// Provisioning status fields reported for a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statustime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updatestatus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updatestatustime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appstatus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appstatustime: Option<String>,
}

impl NodeStatus {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl NodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

// ── Group ─────────────────────────────────────────────────────────

/// How group membership is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    #[default]
    Static,
    Dynamic,
}

/// Raw configuration record of a group.
///
/// `kind`, `members` and `wherevals` are group bookkeeping, not node
/// attributes; only `attributes` takes part in node resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: GroupKind,
    #[serde(default)]
    pub members: Vec<String>,
    /// Membership predicate of dynamic groups (`attr==value` terms).
    #[serde(default)]
    pub wherevals: Vec<String>,
    #[serde(default)]
    pub attributes: AttrMap,
}

impl GroupRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

// ── Reservation ───────────────────────────────────────────────────

/// Persisted node → owner hold of the resource pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub node: String,
    pub owner: String,
    pub instance_id: String,
    /// Unix timestamp (seconds) of the reservation.
    pub reserved_at: u64,
}

// ── Import / export ───────────────────────────────────────────────

/// A bulk inventory document, keyed by object name within each kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InventoryDocument {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node: BTreeMap<String, NodeRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub group: BTreeMap<String, GroupRecord>,
    /// Defaults attribute map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<AttrMap>,
}

impl InventoryDocument {
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.group.is_empty() && self.site.is_none()
    }
}
