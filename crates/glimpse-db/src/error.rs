use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store failures, split so callers can tell "no such row" and constraint
/// rejections apart from everything else.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("foreign key constraint violated")]
    ForeignKeyViolation,

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                {
                    StoreError::UniqueViolation
                } else if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                    StoreError::ForeignKeyViolation
                } else {
                    StoreError::Sqlite(err)
                }
            }
            _ => StoreError::Sqlite(err),
        }
    }
}
