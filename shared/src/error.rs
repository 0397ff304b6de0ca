//! Error taxonomy shared by the stock ledger, the order service and the stores.

use thiserror::Error;

use crate::OrderStatus;

pub type CommerceResult<T> = Result<T, CommerceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// Malformed input, rejected before any state is touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced record does not exist for the caller's tenant.
    ///
    /// Cross-tenant lookups end up here too, so callers cannot probe for
    /// records owned by someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The unit of work could not commit. Nothing it did is visible.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl CommerceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Only infrastructure failures are worth retrying; domain outcomes
    /// would come back the same.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<diesel::result::Error> for CommerceError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl<E: std::error::Error + 'static> From<bb8::RunError<E>> for CommerceError {
    fn from(err: bb8::RunError<E>) -> Self {
        Self::Persistence(format!("connection pool: {err}"))
    }
}
