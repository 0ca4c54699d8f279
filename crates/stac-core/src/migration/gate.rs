//! Startup schema gate.
//!
//! Applies pending steps up to a target revision, then re-reads the recorded
//! revision and compares it with the revision this build expects. Target and
//! expected are configured separately: a deployment can pin an older,
//! compatible schema while newer steps already exist in the registry. The gate
//! reports such divergence but never reconciles it.

use std::path::Path;

use tracing::{debug, info, warn};

use super::error::MigrationError;
use super::registry::{MigrationRegistry, UpgradePath};
use super::step::{Revision, RevisionSelector};
use super::store::{SchemaStore, StepOutcome};

/// What the upgrade phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Revision recorded before the upgrade.
    pub from: Option<Revision>,
    /// Steps this process applied.
    pub applied: Vec<Revision>,
    /// Steps found already applied (typically by a concurrent instance).
    pub already_applied: Vec<Revision>,
    /// Steps skipped because the recorded revision moved elsewhere.
    pub skipped: Vec<Revision>,
}

/// Outcome of a successful readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Revision the database is at, equal to the expected revision.
    pub revision: Revision,
    /// What the upgrade phase did.
    pub upgrade: UpgradeReport,
}

/// Gate that must pass before the service accepts traffic.
#[derive(Debug, Clone)]
pub struct SchemaVersionGate {
    registry: MigrationRegistry,
}

impl SchemaVersionGate {
    /// Create a gate over a loaded registry.
    pub fn new(registry: MigrationRegistry) -> Self {
        Self { registry }
    }

    /// Load the registry at `location` and create a gate over it.
    pub fn load(location: impl AsRef<Path>) -> Result<Self, MigrationError> {
        Ok(Self::new(MigrationRegistry::load(location)?))
    }

    /// The registry the gate works from.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Apply every step between the recorded revision and `target`.
    ///
    /// Each step is handed to the store individually; the store decides under
    /// its lock whether the step still needs to run. Running this twice in a
    /// row leaves the same recorded revision as running it once.
    pub async fn upgrade(
        &self,
        store: &dyn SchemaStore,
        target: &Revision,
    ) -> Result<UpgradeReport, MigrationError> {
        let from = store.current_revision().await?;
        let mut report = UpgradeReport {
            from: from.clone(),
            ..UpgradeReport::default()
        };

        let steps = match self.registry.upgrade_path(from.as_ref(), target)? {
            UpgradePath::Steps(steps) => steps,
            UpgradePath::UpToDate => {
                debug!(revision = %target, "schema already at target revision");
                return Ok(report);
            }
            UpgradePath::Ahead => {
                warn!(
                    recorded = ?from.as_ref().map(Revision::as_str),
                    target = %target,
                    "recorded revision is newer than the target, not downgrading"
                );
                return Ok(report);
            }
            UpgradePath::Unrelated => {
                warn!(
                    recorded = ?from.as_ref().map(Revision::as_str),
                    target = %target,
                    "recorded revision is not an ancestor of the target, skipping upgrade"
                );
                return Ok(report);
            }
        };

        info!(
            from = ?from.as_ref().map(Revision::as_str),
            target = %target,
            pending = steps.len(),
            "applying schema migrations"
        );

        for step in steps {
            match store.apply_step(step).await? {
                StepOutcome::Applied => {
                    info!(revision = %step.revision, description = %step.description, "applied migration");
                    report.applied.push(step.revision.clone());
                }
                StepOutcome::AlreadyApplied => {
                    debug!(revision = %step.revision, "migration already applied");
                    report.already_applied.push(step.revision.clone());
                }
                StepOutcome::Skipped { recorded } => {
                    // Another instance may have moved past this step.
                    let moved_past = recorded
                        .as_ref()
                        .is_some_and(|r| self.registry.is_ancestor(&step.revision, r));
                    if moved_past {
                        report.already_applied.push(step.revision.clone());
                    } else {
                        warn!(
                            revision = %step.revision,
                            recorded = ?recorded.as_ref().map(Revision::as_str),
                            "recorded revision changed during upgrade, skipping step"
                        );
                        report.skipped.push(step.revision.clone());
                    }
                }
            }
        }

        Ok(report)
    }

    /// Compare the recorded revision with `expected`.
    ///
    /// Read-only; needs no lock.
    pub async fn check(
        &self,
        store: &dyn SchemaStore,
        expected: &Revision,
    ) -> Result<Revision, MigrationError> {
        let actual = store.current_revision().await?;
        if actual.as_ref() != Some(expected) {
            return Err(MigrationError::SchemaMismatch {
                actual,
                expected: expected.clone(),
            });
        }
        Ok(expected.clone())
    }

    /// Upgrade to `target`, then require the recorded revision to be `expected`.
    pub async fn ensure_ready(
        &self,
        store: &dyn SchemaStore,
        target: &RevisionSelector,
        expected: &RevisionSelector,
    ) -> Result<Readiness, MigrationError> {
        let target = self.registry.resolve(target)?;
        let expected = self.registry.resolve(expected)?;
        self.report_divergence(&target, &expected);

        let upgrade = self.upgrade(store, &target).await?;
        let revision = self.check(store, &expected).await?;
        info!(revision = %revision, applied = upgrade.applied.len(), "database schema is ready");

        Ok(Readiness { revision, upgrade })
    }

    fn report_divergence(&self, target: &Revision, expected: &Revision) {
        if target != expected {
            warn!(
                target = %target,
                expected = %expected,
                "migration target differs from the expected revision"
            );
        }
        let head = &self.registry.head().revision;
        if head != expected {
            warn!(
                head = %head,
                expected = %expected,
                "registry contains migrations newer than the expected revision"
            );
        }
    }
}

/// Load the scripts at `location`, upgrade `store` to `target` and require
/// `expected`.
pub async fn ensure_ready(
    store: &dyn SchemaStore,
    location: impl AsRef<Path>,
    target: &RevisionSelector,
    expected: &RevisionSelector,
) -> Result<Readiness, MigrationError> {
    SchemaVersionGate::load(location)?
        .ensure_ready(store, target, expected)
        .await
}
