//! StateStore: redb-backed inventory persistence.
//!
//! Provides typed CRUD operations over nodes, groups, the site defaults and
//! pool reservations. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use fleet_core::{AttrMap, InventoryKind, KindSelection};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(GROUPS).map_err(map_err!(Table))?;
        txn.open_table(SITE).map_err(map_err!(Table))?;
        txn.open_table(RESERVATIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ──────────────────────────────────────

    fn put_record<T: Serialize>(&self, def: Table, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(&self, def: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let record = match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
            }
            None => None,
        };
        Ok(record)
    }

    fn list_records<T: DeserializeOwned>(&self, def: Table) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    fn list_keys(&self, def: Table) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    fn delete_record(&self, def: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node record.
    pub fn put_node(&self, node: &NodeRecord) -> StateResult<()> {
        if node.name.is_empty() {
            return Err(StateError::InvalidInput("node name is empty".to_string()));
        }
        self.put_record(NODES, &node.name, node)?;
        debug!(node = %node.name, "node stored");
        Ok(())
    }

    /// Get a node by name.
    pub fn get_node(&self, name: &str) -> StateResult<Option<NodeRecord>> {
        self.get_record(NODES, name)
    }

    /// List all nodes, ordered by name.
    pub fn list_nodes(&self) -> StateResult<Vec<NodeRecord>> {
        self.list_records(NODES)
    }

    /// List all node names, ordered.
    pub fn list_node_names(&self) -> StateResult<Vec<String>> {
        self.list_keys(NODES)
    }

    /// Delete a node by name. Returns true if it existed.
    pub fn delete_node(&self, name: &str) -> StateResult<bool> {
        let existed = self.delete_record(NODES, name)?;
        debug!(node = %name, existed, "node deleted");
        Ok(existed)
    }

    // ── Groups ─────────────────────────────────────────────────────

    /// Insert or update a group record.
    pub fn put_group(&self, group: &GroupRecord) -> StateResult<()> {
        if group.name.is_empty() {
            return Err(StateError::InvalidInput("group name is empty".to_string()));
        }
        self.put_record(GROUPS, &group.name, group)?;
        debug!(group = %group.name, "group stored");
        Ok(())
    }

    /// Get a group by name.
    pub fn get_group(&self, name: &str) -> StateResult<Option<GroupRecord>> {
        self.get_record(GROUPS, name)
    }

    /// List all groups, ordered by name.
    pub fn list_groups(&self) -> StateResult<Vec<GroupRecord>> {
        self.list_records(GROUPS)
    }

    /// Delete a group by name. Returns true if it existed.
    pub fn delete_group(&self, name: &str) -> StateResult<bool> {
        self.delete_record(GROUPS, name)
    }

    // ── Site defaults ──────────────────────────────────────────────

    /// Replace the site defaults attribute map.
    pub fn put_defaults(&self, defaults: &AttrMap) -> StateResult<()> {
        self.put_record(SITE, DEFAULTS_KEY, defaults)?;
        debug!("site defaults stored");
        Ok(())
    }

    /// Get the site defaults, if any were stored.
    pub fn get_defaults(&self) -> StateResult<Option<AttrMap>> {
        self.get_record(SITE, DEFAULTS_KEY)
    }

    // ── Reservations ───────────────────────────────────────────────

    /// List all persisted reservations, ordered by node name.
    pub fn list_reservations(&self) -> StateResult<Vec<Reservation>> {
        self.list_records(RESERVATIONS)
    }

    /// Record new holds and drop released ones in a single transaction.
    ///
    /// Either every change lands or none does.
    pub fn commit_reservations(&self, hold: &[Reservation], free: &[String]) -> StateResult<()> {
        let encoded = hold
            .iter()
            .map(|r| {
                serde_json::to_vec(r)
                    .map(|v| (r.node.as_str(), v))
                    .map_err(map_err!(Serialize))
            })
            .collect::<StateResult<Vec<_>>>()?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RESERVATIONS).map_err(map_err!(Table))?;
            for (node, value) in &encoded {
                table.insert(*node, value.as_slice()).map_err(map_err!(Write))?;
            }
            for node in free {
                table.remove(node.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(held = hold.len(), freed = free.len(), "reservations committed");
        Ok(())
    }

    // ── Import / export ────────────────────────────────────────────

    /// Write every record of `doc` in one transaction.
    ///
    /// Record names are taken from the document keys; a record whose own
    /// name is set and differs from its key is rejected.
    pub fn import(&self, doc: &InventoryDocument) -> StateResult<()> {
        let mut nodes = Vec::with_capacity(doc.node.len());
        for (key, node) in &doc.node {
            let node = named(key, node.clone(), &node.name, |n, name| n.name = name)?;
            let value = serde_json::to_vec(&node).map_err(map_err!(Serialize))?;
            nodes.push((key.as_str(), value));
        }
        let mut groups = Vec::with_capacity(doc.group.len());
        for (key, group) in &doc.group {
            let group = named(key, group.clone(), &group.name, |g, name| g.name = name)?;
            let value = serde_json::to_vec(&group).map_err(map_err!(Serialize))?;
            groups.push((key.as_str(), value));
        }
        let site = doc
            .site
            .as_ref()
            .map(|s| serde_json::to_vec(s).map_err(map_err!(Serialize)))
            .transpose()?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            for (key, value) in &nodes {
                table.insert(*key, value.as_slice()).map_err(map_err!(Write))?;
            }
        }
        {
            let mut table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            for (key, value) in &groups {
                table.insert(*key, value.as_slice()).map_err(map_err!(Write))?;
            }
        }
        if let Some(value) = &site {
            let mut table = txn.open_table(SITE).map_err(map_err!(Table))?;
            table
                .insert(DEFAULTS_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            nodes = nodes.len(),
            groups = groups.len(),
            site = site.is_some(),
            "inventory imported"
        );
        Ok(())
    }

    /// Export the kinds chosen by `selection`.
    pub fn export(&self, selection: &KindSelection) -> StateResult<InventoryDocument> {
        let mut doc = InventoryDocument::default();
        if selection.wants(InventoryKind::Node) {
            doc.node = self
                .list_nodes()?
                .into_iter()
                .map(|n| (n.name.clone(), n))
                .collect();
        }
        if selection.wants(InventoryKind::Group) {
            doc.group = self
                .list_groups()?
                .into_iter()
                .map(|g| (g.name.clone(), g))
                .collect();
        }
        if selection.wants(InventoryKind::Site) {
            doc.site = self.get_defaults()?;
        }
        Ok(doc)
    }
}

/// Reconcile a record's own name with its document key.
fn named<T>(key: &str, mut record: T, name: &str, set: impl FnOnce(&mut T, String)) -> StateResult<T> {
    if key.is_empty() {
        return Err(StateError::InvalidInput("object name is empty".to_string()));
    }
    if !name.is_empty() && name != key {
        return Err(StateError::InvalidInput(format!(
            "record name {name} does not match key {key}"
        )));
    }
    set(&mut record, key.to_string());
    Ok(record)
}
