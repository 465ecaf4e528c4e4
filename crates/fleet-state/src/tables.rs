//! redb table definitions for the fleet state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Node records keyed by node name.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Group records keyed by group name.
pub const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Site-wide records. Holds the defaults attribute map under [`DEFAULTS_KEY`].
pub const SITE: TableDefinition<&str, &[u8]> = TableDefinition::new("site");

/// Pool reservations keyed by node name.
pub const RESERVATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("reservations");

pub const DEFAULTS_KEY: &str = fleet_core::DEFAULTS_GROUP;
