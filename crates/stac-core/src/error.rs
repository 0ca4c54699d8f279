//! Core error types.

use thiserror::Error;

use crate::client::Capability;

/// Errors returned by data-access clients.
///
/// Each variant is scoped to the request that produced it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The resource already exists or conflicts with stored state.
    #[error("{0}")]
    Conflict(String),

    /// The request or resource is invalid.
    #[error("{0}")]
    Validation(String),

    /// No composed extension or base client provides the capability.
    #[error("{capability} is not supported by this service")]
    Unsupported {
        /// The missing capability.
        capability: Capability,
    },

    /// The backing store failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ClientError {
    /// Build a not-found error for a collection.
    pub fn collection_not_found(collection_id: &str) -> Self {
        ClientError::NotFound(format!("collection {} not found", collection_id))
    }

    /// Build a not-found error for an item.
    pub fn item_not_found(collection_id: &str, item_id: &str) -> Self {
        ClientError::NotFound(format!(
            "item {} in collection {} not found",
            item_id, collection_id
        ))
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
