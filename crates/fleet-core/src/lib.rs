pub mod config;
pub mod kind;
pub mod types;

pub use config::{DB_FILE_NAME, FleetConfig};
pub use kind::{InventoryKind, KindError, KindSelection};
pub use types::*;
