//! Read-only accessor over raw inventory records.
//!
//! Resolution only ever reads through this trait, so it can run against
//! any backing store without touching pool state.

use fleet_core::AttrMap;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{GroupRecord, NodeRecord};

pub trait AttributeStore: Send + Sync {
    /// Raw node record, `None` if the node does not exist.
    fn node(&self, name: &str) -> StateResult<Option<NodeRecord>>;

    /// Raw group record, `None` if the group does not exist.
    fn group(&self, name: &str) -> StateResult<Option<GroupRecord>>;

    /// The site defaults map. Empty when none is stored.
    fn defaults(&self) -> StateResult<AttrMap>;

    /// Names of every node in the store.
    fn node_names(&self) -> StateResult<Vec<String>>;
}

impl AttributeStore for StateStore {
    fn node(&self, name: &str) -> StateResult<Option<NodeRecord>> {
        self.get_node(name)
    }

    fn group(&self, name: &str) -> StateResult<Option<GroupRecord>> {
        self.get_group(name)
    }

    fn defaults(&self) -> StateResult<AttrMap> {
        Ok(self.get_defaults()?.unwrap_or_default())
    }

    fn node_names(&self) -> StateResult<Vec<String>> {
        self.list_node_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_defaults_read_as_empty() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.defaults().unwrap().is_empty());
    }

    #[test]
    fn lookups_go_through_the_store() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&NodeRecord::new("node1")).unwrap();
        store.put_group(&GroupRecord::new("all")).unwrap();

        let view: &dyn AttributeStore = &store;
        assert!(view.node("node1").unwrap().is_some());
        assert!(view.node("node9").unwrap().is_none());
        assert!(view.group("all").unwrap().is_some());
        assert_eq!(view.node_names().unwrap(), vec!["node1"]);
    }
}
