use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::utils::response::error as error_response;

/// Failures raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error")]
    Database(#[source] sqlx::Error),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The record is still referenced by sales or purchases and must stay.
    #[error("Record in use: {0}")]
    Referenced(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The backend could not be reached (pool exhausted or closed, I/O failure).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome taxonomy of the reservation engine.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Insufficient inventory for ticket type {ticket_type_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        ticket_type_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Reservation {reservation_id} expired at {expired_at}")]
    Expired {
        reservation_id: Uuid,
        expired_at: DateTime<Utc>,
    },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type TicketResult<T> = Result<T, TicketError>;

impl TicketError {
    /// Builds an `InvariantViolation` and reports it at the point of detection.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(violation = %message, "Inventory invariant violated");
        TicketError::InvariantViolation(message)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient inventory: {0}")]
    InsufficientInventory(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Reservation expired: {0}")]
    Expired(String),

    #[error("Storage error")]
    StorageError(#[from] StoreError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::InvalidArgument(msg) => AppError::ValidationError(msg),
            TicketError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            err @ TicketError::InsufficientInventory { .. } => {
                AppError::InsufficientInventory(err.to_string())
            }
            TicketError::InvalidState(msg) => AppError::InvalidState(msg),
            err @ TicketError::Expired { .. } => AppError::Expired(err.to_string()),
            TicketError::InvariantViolation(msg) => AppError::InternalServerError(msg),
            TicketError::Storage(e) => AppError::StorageError(e),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientInventory(_) => StatusCode::CONFLICT,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Expired(_) => StatusCode::GONE,
            AppError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientInventory(_) => "INSUFFICIENT_INVENTORY",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Expired(_) => "RESERVATION_EXPIRED",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::InsufficientInventory(msg)
            | AppError::InvalidState(msg)
            | AppError::Expired(msg) => {
                tracing::info!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::StorageError(e) => {
                error!(error = ?e, "Storage error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::InsufficientInventory(msg)
            | AppError::InvalidState(msg)
            | AppError::Expired(msg) => msg.clone(),
            AppError::StorageError(_) => "A storage error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}
