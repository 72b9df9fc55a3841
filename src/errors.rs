use sea_orm::error::DbErr;
use uuid::Uuid;

use crate::entities::quote::QuoteStatus;

/// Error type shared by every service in the crate.
///
/// Everything except `DatabaseError` is recoverable at the boundary: the
/// caller corrects its input or observes the signal (`AlreadyConverted`) and
/// moves on.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    #[error("Quote {quote_id} is not editable in status '{status}'")]
    QuoteNotEditable { quote_id: Uuid, status: QuoteStatus },

    #[error("Illegal status transition from '{from}' to '{to}'")]
    IllegalTransition { from: QuoteStatus, to: QuoteStatus },

    #[error("Unknown quote status: '{0}'")]
    UnknownStatus(String),

    #[error("Quote {quote_id} has already been converted to order {order_id}")]
    AlreadyConverted { quote_id: Uuid, order_id: Uuid },

    #[error("Quote {quote_id} cannot be converted in status '{status}'")]
    NotConvertible { quote_id: Uuid, status: QuoteStatus },

    #[error("Quote {quote_id} cannot be deleted in status '{status}'")]
    QuoteNotDeletable { quote_id: Uuid, status: QuoteStatus },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Convenience constructor for wrapping string-based database errors.
    pub fn db_error(message: impl Into<String>) -> Self {
        ServiceError::DatabaseError(DbErr::Custom(message.into()))
    }

    /// True for the idempotent no-op signal raised by a repeated conversion.
    pub fn is_already_converted(&self) -> bool {
        matches!(self, ServiceError::AlreadyConverted { .. })
    }
}
