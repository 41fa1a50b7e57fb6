//! Error types for the access-code store.

use thiserror::Error;

/// Failure reported by a [`CodeStore`](super::store::CodeStore).
///
/// Callers on the redeem/verify path never surface the inner detail to clients;
/// handlers map every variant to the same generic message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write (code or token collision).
    #[error("conflicting {0} already exists")]
    Conflict(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into a model.
    #[error("corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },
}

impl StoreError {
    /// Map a sqlx error, turning SQLSTATE `23505` into [`StoreError::Conflict`].
    pub(crate) fn from_sqlx(err: sqlx::Error, entity: &'static str) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(entity)
        } else {
            Self::Database(err)
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
