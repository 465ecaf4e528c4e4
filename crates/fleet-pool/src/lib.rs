//! fleet-pool: on-demand node reservation.
//!
//! Callers ask for N nodes matching some criteria; the pool picks them at
//! random from the free set and holds them for that caller until released.
//!
//! - Criteria are compiled into typed predicates before any pool state is
//!   read, so a bad filter never has a partial effect.
//! - Every node is either free or reserved by exactly one owner. One mutex
//!   guards that map; attribute resolution happens outside it.
//! - With a [`StateStore`](fleet_state::StateStore) attached, each
//!   transition is committed in a single redb transaction before the
//!   in-memory state flips.
//!
//! # Architecture
//!
//! ```text
//! PoolAllocator
//!   ├── CriteriaEvaluator (compile criteria → CompiledFilter)
//!   ├── Inventory (effective attributes, read path, no pool lock)
//!   ├── Mutex<PoolState> (node → Free | Reserved(owner))
//!   └── StateStore (optional, reservations table)
//! ```

pub mod allocator;
pub mod criteria;
pub mod error;
pub mod selection;

pub use allocator::{AllocationRecord, NodeState, PoolAllocator};
pub use criteria::{CompiledFilter, Criteria, CriteriaEvaluator, KeyClass, Predicate};
pub use error::{PoolError, PoolResult};
pub use selection::sample;
