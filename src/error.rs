//! Typed domain errors raised by the recommendation and clustering cores

use thiserror::Error;

/// Failures detected while validating input or answering a query.
///
/// These propagate unmodified to the caller; the binary maps any of them to a
/// non-zero exit code.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("customer {customer_id} has no purchase history in the dataset")]
    InvalidCustomer { customer_id: i64 },

    #[error("invalid customer ID {customer_id}: expected a value between {min} and {max}")]
    InvalidRange { customer_id: i64, min: i64, max: i64 },

    #[error("dataset contains no purchase records")]
    EmptyDataset,

    #[error("invalid purchase record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("cannot form {k} clusters from {customers} distinct customers")]
    InvalidClusterCount { k: usize, customers: usize },

    #[error("invalid weights: {0}")]
    InvalidWeights(String),
}
