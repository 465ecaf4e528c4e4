//! Inventory error types.

use thiserror::Error;

/// Errors that can occur while resolving inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("state store error: {0}")]
    State(#[from] fleet_state::StateError),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
