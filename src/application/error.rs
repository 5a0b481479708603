use thiserror::Error;

use crate::domain::Cents;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot pay yourself")]
    SelfPayment,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Email already exists: {0}")]
    EmailTaken(String),

    #[error("User {user} is not a member of group {group}")]
    NotGroupMember { user: String, group: String },

    #[error("User {user} may not modify expense {expense}")]
    NotExpenseParticipant { user: String, expense: String },

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Broad category of an [`AppError`], for callers that map errors onto
/// status codes or exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    InsufficientFunds,
    Unauthenticated,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidAmount(_) | AppError::InvalidInput(_) | AppError::SelfPayment => {
                ErrorKind::Validation
            }
            AppError::UserNotFound(_)
            | AppError::GroupNotFound(_)
            | AppError::ExpenseNotFound(_)
            | AppError::NotificationNotFound(_) => ErrorKind::NotFound,
            AppError::UsernameTaken(_) | AppError::EmailTaken(_) => ErrorKind::Conflict,
            AppError::NotGroupMember { .. } | AppError::NotExpenseParticipant { .. } => {
                ErrorKind::Forbidden
            }
            AppError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            AppError::InvalidCredentials => ErrorKind::Unauthenticated,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }
}
