//! Group resolution: which raw records make up a node.
//!
//! Reads the node record, then every group it lists (in the stored order)
//! and the site defaults. Groups that do not exist are skipped.

use fleet_core::{AttrMap, DEFAULTS_GROUP};
use fleet_state::{AttributeStore, GroupRecord, NodeRecord};
use tracing::debug;

use crate::error::{InventoryError, InventoryResult};

/// The raw, unmerged inputs for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecords {
    pub node: NodeRecord,
    /// Membership order followed by the defaults pseudo-group.
    pub groups: Vec<String>,
    /// Fetched group records in membership order.
    pub group_records: Vec<GroupRecord>,
    pub defaults: AttrMap,
}

/// Fetch the node, its groups and the defaults from `store`.
pub fn resolve<S: AttributeStore + ?Sized>(
    store: &S,
    node_name: &str,
) -> InventoryResult<ResolvedRecords> {
    let node = store
        .node(node_name)?
        .ok_or_else(|| InventoryError::NodeNotFound(node_name.to_string()))?;

    let mut group_records = Vec::with_capacity(node.groups.len());
    for name in node.groups.iter().filter(|g| !g.is_empty()) {
        match store.group(name)? {
            Some(record) => group_records.push(record),
            None => debug!(node = node_name, group = %name, "group not defined, skipping"),
        }
    }

    let mut groups = node.groups.clone();
    groups.push(DEFAULTS_GROUP.to_string());

    Ok(ResolvedRecords {
        defaults: store.defaults()?,
        node,
        groups,
        group_records,
    })
}
