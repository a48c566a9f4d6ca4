//! Error types for fleet-types.

use thiserror::Error;

/// Errors raised while parsing identity and role values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Role tag is not of the form `<service>.<id>`
    #[error("invalid role tag: {0:?}")]
    InvalidRole(String),

    /// Cluster id is not a UUID
    #[error("invalid cluster id: {0:?}")]
    InvalidClusterId(String),

    /// Agent address is empty or contains whitespace
    #[error("invalid agent address: {0:?}")]
    InvalidAddress(String),
}
