//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("not supported criteria type: {0}")]
    UnsupportedCriteria(String),

    #[error("malformed criteria {key}: {reason}")]
    MalformedCriteria { key: String, reason: String },

    #[error("not enough free resource matched: requested {requested}, available {available}")]
    InsufficientResource { requested: usize, available: usize },

    #[error("node {node} is not reserved by {owner}")]
    Ownership { node: String, owner: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("state store error: {0}")]
    State(#[from] fleet_state::StateError),

    #[error("inventory error: {0}")]
    Inventory(#[from] fleet_inventory::InventoryError),
}

pub type PoolResult<T> = Result<T, PoolError>;

impl PoolError {
    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        PoolError::MalformedCriteria {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
