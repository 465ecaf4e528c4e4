//! Pool allocator: reserve, release and query nodes.
//!
//! The allocator owns the node → state map for its universe of nodes. A
//! reservation runs in two phases:
//!
//! 1. Compile the criteria and resolve effective attributes for every free
//!    node. This reads the inventory and does not hold the pool lock.
//! 2. Take the lock, keep the candidates that are still free, sample the
//!    requested number and flip them to reserved.
//!
//! Two concurrent requests can therefore both see a node as a candidate,
//! but only one of them can take it.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use fleet_inventory::{Inventory, InventoryError};
use fleet_state::{Reservation, StateStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::criteria::{CompiledFilter, Criteria, CriteriaEvaluator};
use crate::error::{PoolError, PoolResult};
use crate::selection::sample;

/// Allocation state of one node in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    Free,
    Reserved { owner: String },
}

/// Result of a successful reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub instance_id: String,
    pub owner: String,
    /// Reserved nodes, sorted by name.
    pub nodes: Vec<String>,
    /// Unix timestamp (seconds).
    pub created_at: u64,
}

/// In-memory pool state. Every node of the universe has exactly one entry.
#[derive(Debug, Default)]
struct PoolState {
    nodes: BTreeMap<String, NodeState>,
}

impl PoolState {
    fn new(universe: impl IntoIterator<Item = String>) -> Self {
        Self {
            nodes: universe.into_iter().map(|n| (n, NodeState::Free)).collect(),
        }
    }

    fn free(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, s)| **s == NodeState::Free)
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn is_free(&self, node: &str) -> bool {
        matches!(self.nodes.get(node), Some(NodeState::Free))
    }

    fn owned_by(&self, owner: &str) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter(|(_, s)| matches!(s, NodeState::Reserved { owner: o } if o == owner))
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Flip `nodes` from free to reserved by `owner`.
    ///
    /// Callers pick `nodes` from the free set under the same lock; anything
    /// else is a bug and aborts.
    fn reserve(&mut self, nodes: &[String], owner: &str) {
        for node in nodes {
            let Some(slot) = self.nodes.get_mut(node) else {
                panic!("pool invariant violated: {node} is not in the pool");
            };
            assert!(
                *slot == NodeState::Free,
                "pool invariant violated: {node} selected while {slot:?}"
            );
            *slot = NodeState::Reserved {
                owner: owner.to_string(),
            };
        }
    }

    fn release(&mut self, nodes: &[String]) {
        for node in nodes {
            if let Some(slot) = self.nodes.get_mut(node) {
                *slot = NodeState::Free;
            }
        }
    }
}

/// Hands out nodes from a fixed universe to named owners.
///
/// Share it across tasks behind an `Arc`; all methods take `&self`.
pub struct PoolAllocator {
    inventory: Inventory,
    evaluator: CriteriaEvaluator,
    state: Mutex<PoolState>,
    store: Option<StateStore>,
}

impl PoolAllocator {
    /// Create a pool over `universe` with every node free.
    pub fn new(inventory: Inventory, universe: impl IntoIterator<Item = String>) -> Self {
        Self {
            inventory,
            evaluator: CriteriaEvaluator::new(),
            state: Mutex::new(PoolState::new(universe)),
            store: None,
        }
    }

    /// Create a pool over every inventory node, or only the members of
    /// `managed_group` when given.
    pub fn discover(inventory: Inventory, managed_group: Option<&str>) -> PoolResult<Self> {
        let universe = inventory.node_names(managed_group)?;
        debug!(nodes = universe.len(), group = ?managed_group, "pool universe discovered");
        Ok(Self::new(inventory, universe))
    }

    /// Use `evaluator` for criteria compilation (custom attribute paths).
    pub fn with_evaluator(mut self, evaluator: CriteriaEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Persist reservations to `store` and restore the ones it holds.
    ///
    /// Persisted holds on nodes outside the universe are dropped from the
    /// store.
    pub fn with_store(mut self, store: StateStore) -> PoolResult<Self> {
        let state = self.state.get_mut();
        let mut stale = Vec::new();
        let mut restored = 0usize;
        for reservation in store.list_reservations()? {
            match state.nodes.get_mut(&reservation.node) {
                Some(slot) => {
                    *slot = NodeState::Reserved {
                        owner: reservation.owner,
                    };
                    restored += 1;
                }
                None => {
                    warn!(
                        node = %reservation.node,
                        owner = %reservation.owner,
                        "dropping reservation for node outside the pool"
                    );
                    stale.push(reservation.node);
                }
            }
        }
        if !stale.is_empty() {
            store.commit_reservations(&[], &stale)?;
        }
        info!(restored, dropped = stale.len(), "pool reservations restored");
        self.store = Some(store);
        Ok(self)
    }

    /// Reserve `count` free nodes matching `criteria` for `owner`.
    pub async fn reserve(
        &self,
        count: usize,
        criteria: &Criteria,
        owner: &str,
    ) -> PoolResult<AllocationRecord> {
        self.reserve_with_instance(count, criteria, owner, None).await
    }

    /// Like [`reserve`](Self::reserve), tagging the allocation with the
    /// caller's `instance_id` instead of a generated one.
    pub async fn reserve_with_instance(
        &self,
        count: usize,
        criteria: &Criteria,
        owner: &str,
        instance_id: Option<String>,
    ) -> PoolResult<AllocationRecord> {
        if count == 0 {
            return Err(PoolError::InvalidRequest(
                "count must be at least 1".to_string(),
            ));
        }
        if owner.trim().is_empty() {
            return Err(PoolError::InvalidRequest("owner must not be empty".to_string()));
        }
        let filter = self.evaluator.compile(criteria)?;

        let free = self.state.lock().await.free();
        let matching = self.filter_free(&filter, free)?;
        if matching.len() < count {
            return Err(PoolError::InsufficientResource {
                requested: count,
                available: matching.len(),
            });
        }

        let mut state = self.state.lock().await;
        let candidates: Vec<String> = matching.into_iter().filter(|n| state.is_free(n)).collect();
        if candidates.len() < count {
            return Err(PoolError::InsufficientResource {
                requested: count,
                available: candidates.len(),
            });
        }

        let mut nodes = sample(&candidates, count, &mut rand::thread_rng());
        nodes.sort();
        let instance_id = instance_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = epoch_secs();

        if let Some(store) = &self.store {
            let holds: Vec<Reservation> = nodes
                .iter()
                .map(|node| Reservation {
                    node: node.clone(),
                    owner: owner.to_string(),
                    instance_id: instance_id.clone(),
                    reserved_at: created_at,
                })
                .collect();
            store.commit_reservations(&holds, &[])?;
        }
        state.reserve(&nodes, owner);
        drop(state);

        info!(
            owner,
            instance_id = %instance_id,
            nodes = ?nodes,
            "nodes reserved"
        );
        Ok(AllocationRecord {
            instance_id,
            owner: owner.to_string(),
            nodes,
            created_at,
        })
    }

    /// Return `nodes` to the free set.
    ///
    /// Every node must currently be reserved by `owner`; otherwise nothing
    /// is released. Free nodes, nodes held by someone else and names outside
    /// the pool are all rejected with [`PoolError::Ownership`].
    pub async fn release(&self, nodes: &[String], owner: &str) -> PoolResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let unique: Vec<String> = nodes
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut state = self.state.lock().await;
        for node in &unique {
            let held = matches!(
                state.nodes.get(node),
                Some(NodeState::Reserved { owner: held_by }) if held_by == owner
            );
            if !held {
                return Err(PoolError::Ownership {
                    node: node.clone(),
                    owner: owner.to_string(),
                });
            }
        }

        if let Some(store) = &self.store {
            store.commit_reservations(&[], &unique)?;
        }
        state.release(&unique);
        drop(state);

        info!(owner, nodes = ?unique, "nodes released");
        Ok(())
    }

    /// Release everything `owner` holds. Returns the freed nodes.
    pub async fn release_all(&self, owner: &str) -> PoolResult<Vec<String>> {
        let mut state = self.state.lock().await;
        let owned: Vec<String> = state.owned_by(owner).into_iter().collect();
        if owned.is_empty() {
            return Ok(owned);
        }
        if let Some(store) = &self.store {
            store.commit_reservations(&[], &owned)?;
        }
        state.release(&owned);
        drop(state);

        info!(owner, count = owned.len(), "all nodes released");
        Ok(owned)
    }

    /// Nodes currently reserved by `owner`.
    pub async fn query(&self, owner: &str) -> BTreeSet<String> {
        self.state.lock().await.owned_by(owner)
    }

    pub async fn free_nodes(&self) -> BTreeSet<String> {
        self.state.lock().await.free().into_iter().collect()
    }

    /// Copy of the full node → state map.
    pub async fn snapshot(&self) -> BTreeMap<String, NodeState> {
        self.state.lock().await.nodes.clone()
    }

    /// Keep the free nodes whose effective attributes pass `filter`.
    fn filter_free(&self, filter: &CompiledFilter, free: Vec<String>) -> PoolResult<Vec<String>> {
        if filter.is_empty() {
            return Ok(free);
        }
        let mut matching = Vec::new();
        for name in free {
            let config = match self.inventory.resolve_node(&name) {
                Ok(config) => config,
                Err(InventoryError::NodeNotFound(_)) => {
                    warn!(node = %name, "pool node missing from inventory, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if filter.matches(&config) {
                matching.push(name);
            }
        }
        debug!(matched = matching.len(), "criteria evaluated");
        Ok(matching)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
