//! Inventory facade: the read path callers use.

use std::sync::Arc;

use fleet_state::AttributeStore;
use tracing::debug;

use crate::error::{InventoryError, InventoryResult};
use crate::merger::{EffectiveConfig, merge};
use crate::resolver::resolve;
use crate::status::StatusView;

/// Read-only inventory over an [`AttributeStore`].
///
/// Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct Inventory {
    store: Arc<dyn AttributeStore>,
}

impl Inventory {
    pub fn new(store: impl AttributeStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Effective configuration of `name`.
    pub fn resolve_node(&self, name: &str) -> InventoryResult<EffectiveConfig> {
        let records = resolve(self.store.as_ref(), name)?;
        let config = merge(&records.node, &records.group_records, &records.defaults);
        debug!(
            node = name,
            groups = records.group_records.len(),
            keys = config.attributes.len(),
            "node resolved"
        );
        Ok(config)
    }

    /// Provisioning status of `name`.
    pub fn node_status(&self, name: &str) -> InventoryResult<StatusView> {
        let node = self
            .store
            .node(name)?
            .ok_or_else(|| InventoryError::NodeNotFound(name.to_string()))?;
        Ok(StatusView::from(&node.status))
    }

    /// Names of all nodes, or only those that list `group` among their groups.
    pub fn node_names(&self, group: Option<&str>) -> InventoryResult<Vec<String>> {
        let names = self.store.node_names()?;
        let Some(group) = group else {
            return Ok(names);
        };
        let mut members = Vec::new();
        for name in names {
            if let Some(node) = self.store.node(&name)? {
                if node.in_group(group) {
                    members.push(name);
                }
            }
        }
        Ok(members)
    }
}
