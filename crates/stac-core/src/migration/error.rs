//! Migration-specific error types.

use std::path::PathBuf;

use thiserror::Error;

use super::step::Revision;

/// Broad class of a migration failure, used to pick an operator response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The migration definitions or the selected revisions are wrong.
    /// Fatal, never retried.
    Configuration,
    /// The database could not be reached. The process should exit so a
    /// supervisor can restart it.
    Connectivity,
    /// The database schema does not match what this build expects.
    Readiness,
    /// A step or bookkeeping statement failed while the database was reachable.
    Operational,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Configuration => write!(f, "configuration"),
            ErrorClass::Connectivity => write!(f, "connectivity"),
            ErrorClass::Readiness => write!(f, "readiness"),
            ErrorClass::Operational => write!(f, "operational"),
        }
    }
}

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The chain does not have exactly one root and one head.
    #[error("ambiguous migration chain: {detail}")]
    AmbiguousChain {
        /// What made the chain ambiguous.
        detail: String,
    },

    /// Two scripts declare the same revision.
    #[error("duplicate revision {revision} in {first} and {second}")]
    DuplicateRevision {
        /// The duplicated revision.
        revision: Revision,
        /// First script declaring it.
        first: PathBuf,
        /// Second script declaring it.
        second: PathBuf,
    },

    /// A step names a predecessor that no script declares.
    #[error("revision {revision} depends on unknown revision {down_revision}")]
    MissingPredecessor {
        /// The step with the dangling reference.
        revision: Revision,
        /// The predecessor that could not be found.
        down_revision: Revision,
    },

    /// A pinned revision is not part of the registry.
    #[error("revision {revision} is not defined in the migration registry")]
    UnknownRevision {
        /// The revision that was asked for.
        revision: Revision,
    },

    /// A migration script header could not be parsed.
    #[error("malformed migration script {path}: {reason}")]
    MalformedScript {
        /// Path of the offending script.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The migration directory could not be read.
    #[error("failed to read migrations at {path}: {source}")]
    Io {
        /// Directory or file being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The database could not be reached.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// A migration step failed and was rolled back.
    #[error("migration step {revision} failed: {message}")]
    StepFailed {
        /// The revision of the failed step.
        revision: Revision,
        /// Error message.
        message: String,
    },

    /// Reading or writing the bookkeeping table failed.
    #[error("schema bookkeeping error: {0}")]
    Store(String),

    /// The recorded revision differs from the one this build requires.
    #[error(
        "upgrade the database: current migration revision {} does not match expected revision {expected}",
        display_revision(.actual.as_ref())
    )]
    SchemaMismatch {
        /// Revision recorded in the database, if any.
        actual: Option<Revision>,
        /// Revision this build was made for.
        expected: Revision,
    },
}

fn display_revision(revision: Option<&Revision>) -> String {
    revision
        .map(|r| r.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

impl MigrationError {
    /// Classify the error for operators.
    pub fn class(&self) -> ErrorClass {
        match self {
            MigrationError::AmbiguousChain { .. }
            | MigrationError::DuplicateRevision { .. }
            | MigrationError::MissingPredecessor { .. }
            | MigrationError::UnknownRevision { .. }
            | MigrationError::MalformedScript { .. }
            | MigrationError::Io { .. } => ErrorClass::Configuration,
            MigrationError::Connection(_) => ErrorClass::Connectivity,
            MigrationError::SchemaMismatch { .. } => ErrorClass::Readiness,
            MigrationError::StepFailed { .. } | MigrationError::Store(_) => {
                ErrorClass::Operational
            }
        }
    }
}
