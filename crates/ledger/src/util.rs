//! Internal helpers for validation and error mapping.
//!
//! These utilities are **not** part of the public API.

use sea_orm::DbErr;

use crate::{EngineError, ResultEngine};

/// Reject empty names/codes and trim the rest.
pub(crate) fn normalize_required(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAccount(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// `true` when the database refused the write because another writer held
/// it (SQLite busy/locked, Postgres serialization or deadlock failures).
pub(crate) fn is_contention(err: &DbErr) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("could not serialize")
        || message.contains("deadlock detected")
}

/// `true` for unique/primary-key violations.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    ) {
        return true;
    }
    let message = err.to_string().to_ascii_lowercase();
    message.contains("unique constraint") || message.contains("duplicate key")
}

/// Map a database error, turning contention into `ConcurrencyConflict`.
pub(crate) fn map_db_err(err: DbErr) -> EngineError {
    if is_contention(&err) {
        EngineError::ConcurrencyConflict(err.to_string())
    } else {
        EngineError::Database(err)
    }
}
