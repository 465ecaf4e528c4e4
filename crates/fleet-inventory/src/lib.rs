//! Fleet inventory resolution: effective node configuration.
//!
//! Computes what a node actually looks like once its groups and the site
//! defaults are layered underneath it. Everything here is read-only: it
//! consults an [`AttributeStore`](fleet_state::AttributeStore) and never
//! touches pool state.
//!
//! # Components
//!
//! - **`resolver`**: node → ordered group memberships and raw records
//! - **`merger`**: recursive override merge, bookkeeping strip, defaults append
//! - **`status`**: REST-style view of node provisioning status
//! - **`inventory`**: the `Inventory` facade tying them together

pub mod error;
pub mod inventory;
pub mod merger;
pub mod resolver;
pub mod status;

pub use error::{InventoryError, InventoryResult};
pub use inventory::Inventory;
pub use merger::{APPEND_KEYS, EffectiveConfig, GROUP_BOOKKEEPING_KEYS, merge, merge_override};
pub use resolver::{ResolvedRecords, resolve};
pub use status::{StatusEntry, StatusView};
