//! Mapping of driver errors onto service errors.

use stac_core::error::ClientError;
use stac_core::migration::{MigrationError, Revision};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Whether `err` is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(UNIQUE_VIOLATION)
}

/// Whether `err` is a foreign key violation.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(FOREIGN_KEY_VIOLATION)
}

/// Whether `err` means the server could not be reached or the pool gave up.
pub fn is_connectivity(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Map a driver error raised while reading or writing schema bookkeeping.
pub fn migration_error(err: sqlx::Error) -> MigrationError {
    if is_connectivity(&err) {
        MigrationError::Connection(err.to_string())
    } else {
        MigrationError::Store(err.to_string())
    }
}

/// Map a driver error raised by a step body.
pub fn step_error(revision: &Revision, err: sqlx::Error) -> MigrationError {
    if is_connectivity(&err) {
        MigrationError::Connection(err.to_string())
    } else {
        MigrationError::StepFailed {
            revision: revision.clone(),
            message: err.to_string(),
        }
    }
}

/// Map a driver error raised by a catalog request.
pub fn client_error(err: sqlx::Error) -> ClientError {
    ClientError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_connectivity() {
        assert!(matches!(
            migration_error(sqlx::Error::PoolTimedOut),
            MigrationError::Connection(_)
        ));
    }

    #[test]
    fn test_row_not_found_is_store_error() {
        assert!(matches!(
            migration_error(sqlx::Error::RowNotFound),
            MigrationError::Store(_)
        ));
        let err = step_error(&Revision::new("a"), sqlx::Error::RowNotFound);
        assert!(matches!(err, MigrationError::StepFailed { .. }));
    }

    #[test]
    fn test_non_database_errors_have_no_sqlstate() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_foreign_key_violation(&sqlx::Error::PoolClosed));
    }
}
