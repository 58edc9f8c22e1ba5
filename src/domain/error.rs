use rust_decimal::Decimal;
use thiserror::Error;

use super::transaction::TransactionStatus;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure taxonomy for the trading core. Routes translate these into
/// HTTP status codes, the db layer folds sqlx failures into `Repository`.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("business rule violated: {0}")]
    BusinessRule(String),

    #[error("insufficient funds: balance {balance} is below amount {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("repository error: {0}")]
    Repository(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.to_string())
    }
}
