//! Schema bookkeeping stores.
//!
//! A [`SchemaStore`] owns the database's record of the last applied revision
//! and knows how to apply a single step atomically. Implementations must make
//! [`SchemaStore::apply_step`] mutually exclusive across processes and must
//! re-check the recorded revision under that exclusion, so that two instances
//! racing on the same step apply it exactly once.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::MigrationError;
use super::step::{MigrationStep, Revision};

/// Result of asking a store to apply one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and the bookkeeping table now records it.
    Applied,
    /// The bookkeeping table already recorded this step.
    AlreadyApplied,
    /// The recorded revision is neither the step's predecessor nor the step
    /// itself, so nothing was done.
    Skipped {
        /// Revision found under the lock.
        recorded: Option<Revision>,
    },
}

/// Persistent record of the applied schema revision.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Read the recorded revision. `None` when nothing has been applied.
    async fn current_revision(&self) -> Result<Option<Revision>, MigrationError>;

    /// Apply `step` if and only if the recorded revision is its predecessor.
    ///
    /// The check, the step body and the bookkeeping update happen in one
    /// transaction under an exclusive lock. A failing body must leave the
    /// recorded revision unchanged.
    async fn apply_step(&self, step: &MigrationStep) -> Result<StepOutcome, MigrationError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    revision: Option<Revision>,
    applied: Vec<Revision>,
}

/// In-process schema store.
///
/// Used for tests and for running the service without a database. Records
/// every application so callers can assert that a step ran exactly once.
#[derive(Debug, Default)]
pub struct MemorySchemaStore {
    state: Mutex<MemoryState>,
    failing: Mutex<HashSet<Revision>>,
    unreachable: bool,
}

impl MemorySchemaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already records `revision`.
    pub fn at_revision(revision: impl Into<Revision>) -> Self {
        let store = Self::default();
        store.state.lock().revision = Some(revision.into());
        store
    }

    /// Create a store whose every call fails with a connection error.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Make the body of `revision` fail when applied.
    pub fn fail_on(self, revision: impl Into<Revision>) -> Self {
        self.failing.lock().insert(revision.into());
        self
    }

    /// Revisions applied through this store, in order.
    pub fn applied(&self) -> Vec<Revision> {
        self.state.lock().applied.clone()
    }

    /// Number of times `revision` was applied.
    pub fn times_applied(&self, revision: &Revision) -> usize {
        self.state
            .lock()
            .applied
            .iter()
            .filter(|applied| *applied == revision)
            .count()
    }

    fn check_reachable(&self) -> Result<(), MigrationError> {
        if self.unreachable {
            return Err(MigrationError::Connection(
                "memory store configured as unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn current_revision(&self) -> Result<Option<Revision>, MigrationError> {
        self.check_reachable()?;
        Ok(self.state.lock().revision.clone())
    }

    async fn apply_step(&self, step: &MigrationStep) -> Result<StepOutcome, MigrationError> {
        self.check_reachable()?;
        let mut state = self.state.lock();

        if state.revision.as_ref() == Some(&step.revision) {
            return Ok(StepOutcome::AlreadyApplied);
        }
        if state.revision != step.down_revision {
            return Ok(StepOutcome::Skipped {
                recorded: state.revision.clone(),
            });
        }
        if self.failing.lock().contains(&step.revision) {
            return Err(MigrationError::StepFailed {
                revision: step.revision.clone(),
                message: "injected failure".to_string(),
            });
        }

        state.revision = Some(step.revision.clone());
        state.applied.push(step.revision.clone());
        Ok(StepOutcome::Applied)
    }
}
