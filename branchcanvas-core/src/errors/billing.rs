//! Credit ledger error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    /// Profile missing for the user
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),

    /// Credit amount must be positive for grants
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl BillingError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BillingError::ProfileNotFound(_) => "NOT_FOUND",
            BillingError::InvalidAmount(_) => "VALIDATION_FAILED",
            BillingError::Database(_) => "DATABASE_ERROR",
        }
    }
}
