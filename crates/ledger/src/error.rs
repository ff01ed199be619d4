//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidState`] thrown when a document is posted outside its allowed
//!   lifecycle states.
//! - [`UnbalancedEntry`] thrown when the lines of an entry do not net to zero.
//! - [`ConcurrencyConflict`] thrown when the database keeps reporting
//!   contention after all retries.
//! - [`KeyNotFound`] thrown when an item is not found.
//!
//! Drift between cached and projected balances is *not* an error: it is
//! reported by [`Engine::verify_integrity`](crate::Engine::verify_integrity).
//!
//!  [`InvalidState`]: EngineError::InvalidState
//!  [`UnbalancedEntry`]: EngineError::UnbalancedEntry
//!  [`ConcurrencyConflict`]: EngineError::ConcurrencyConflict
//!  [`KeyNotFound`]: EngineError::KeyNotFound
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unbalanced entry: debit {debit} != credit {credit}")]
    UnbalancedEntry { debit: i64, credit: i64 },
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (
                Self::UnbalancedEntry {
                    debit: da,
                    credit: ca,
                },
                Self::UnbalancedEntry {
                    debit: db,
                    credit: cb,
                },
            ) => da == db && ca == cb,
            (Self::ConcurrencyConflict(a), Self::ConcurrencyConflict(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidAccount(a), Self::InvalidAccount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
