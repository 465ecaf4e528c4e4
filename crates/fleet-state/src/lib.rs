//! fleet-state: embedded inventory store for the fleet.
//!
//! Backed by [redb](https://docs.rs/redb), holds the raw node, group and
//! site-defaults records the inventory is resolved from, plus the node →
//! owner reservations of the resource pool.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns and
//! keyed by object name. The [`AttributeStore`] trait is the read-only view
//! the resolver consumes; [`StateStore`] is its redb implementation.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod attributes;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use attributes::AttributeStore;
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
