//! Migration registry: the ordered chain of known schema steps.
//!
//! The registry is built from a directory of `*.sql` scripts (or from steps
//! supplied in code) and validated into a single linear chain: exactly one
//! root, exactly one head, every step reachable by following successor links
//! from the root. It never touches the database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::error::MigrationError;
use super::step::{MigrationStep, Revision, RevisionSelector};

/// Where a recorded revision sits relative to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradePath<'a> {
    /// Steps to apply, oldest first.
    Steps(Vec<&'a MigrationStep>),
    /// The recorded revision already is the target.
    UpToDate,
    /// The recorded revision is a descendant of the target. Nothing is
    /// downgraded.
    Ahead,
    /// The recorded revision is not part of this registry.
    Unrelated,
}

/// Validated, ordered chain of migration steps.
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
    /// Steps from root to head.
    chain: Vec<MigrationStep>,
    /// Revision -> index in `chain`.
    positions: HashMap<Revision, usize>,
    /// Directory the steps were loaded from, if any.
    location: Option<PathBuf>,
}

impl MigrationRegistry {
    /// Scan a directory of migration scripts.
    pub fn load(location: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let location = location.as_ref();
        let io_err = |source| MigrationError::Io {
            path: location.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(location).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                paths.push(path);
            }
        }
        // Directory order is platform dependent.
        paths.sort();

        let mut steps = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| MigrationError::Io {
                path: path.clone(),
                source,
            })?;
            steps.push(MigrationStep::parse(&path, &text)?);
        }

        let mut registry = Self::from_steps(steps)?;
        registry.location = Some(location.to_path_buf());
        tracing::debug!(
            location = %location.display(),
            steps = registry.len(),
            head = %registry.head().revision,
            "loaded migration registry"
        );
        Ok(registry)
    }

    /// Build a registry from steps in any order.
    pub fn from_steps(steps: Vec<MigrationStep>) -> Result<Self, MigrationError> {
        let mut by_revision: HashMap<Revision, MigrationStep> = HashMap::with_capacity(steps.len());
        for step in steps {
            if let Some(existing) = by_revision.get(&step.revision) {
                return Err(MigrationError::DuplicateRevision {
                    revision: step.revision.clone(),
                    first: existing.path.clone().unwrap_or_default(),
                    second: step.path.clone().unwrap_or_default(),
                });
            }
            by_revision.insert(step.revision.clone(), step);
        }

        let mut successors: HashMap<&Revision, Vec<&Revision>> = HashMap::new();
        let mut roots = Vec::new();
        for step in by_revision.values() {
            match &step.down_revision {
                Some(down) => {
                    if !by_revision.contains_key(down) {
                        return Err(MigrationError::MissingPredecessor {
                            revision: step.revision.clone(),
                            down_revision: down.clone(),
                        });
                    }
                    successors.entry(down).or_default().push(&step.revision);
                }
                None => roots.push(&step.revision),
            }
        }

        let mut heads: Vec<&Revision> = by_revision
            .keys()
            .filter(|revision| !successors.contains_key(revision))
            .collect();
        heads.sort();
        roots.sort();

        if heads.len() != 1 {
            return Err(MigrationError::AmbiguousChain {
                detail: format!("expected exactly one head, found {}", list(&heads)),
            });
        }
        if roots.len() != 1 {
            return Err(MigrationError::AmbiguousChain {
                detail: format!("expected exactly one root, found {}", list(&roots)),
            });
        }

        let mut order = Vec::with_capacity(by_revision.len());
        let mut cursor = Some(roots[0]);
        while let Some(revision) = cursor {
            order.push(revision.clone());
            cursor = match successors.get(revision).map(Vec::as_slice) {
                None => None,
                Some([next]) => Some(*next),
                Some(branches) => {
                    let mut branches = branches.to_vec();
                    branches.sort();
                    return Err(MigrationError::AmbiguousChain {
                        detail: format!("revision {} branches into {}", revision, list(&branches)),
                    });
                }
            };
        }
        if order.len() != by_revision.len() {
            return Err(MigrationError::AmbiguousChain {
                detail: format!(
                    "{} of {} revisions are not reachable from root {}",
                    by_revision.len() - order.len(),
                    by_revision.len(),
                    roots[0]
                ),
            });
        }

        let chain: Vec<MigrationStep> = order
            .iter()
            .filter_map(|revision| by_revision.remove(revision))
            .collect();
        let positions = chain
            .iter()
            .enumerate()
            .map(|(index, step)| (step.revision.clone(), index))
            .collect();

        Ok(Self {
            chain,
            positions,
            location: None,
        })
    }

    /// The most recent step.
    pub fn head(&self) -> &MigrationStep {
        // `from_steps` rejects empty chains (zero heads).
        &self.chain[self.chain.len() - 1]
    }

    /// The first step.
    pub fn root(&self) -> &MigrationStep {
        &self.chain[0]
    }

    /// All steps, oldest first.
    pub fn history(&self) -> &[MigrationStep] {
        &self.chain
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false for a validated registry.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Directory the steps were loaded from.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Look up a step.
    pub fn get(&self, revision: &Revision) -> Option<&MigrationStep> {
        self.positions.get(revision).map(|&index| &self.chain[index])
    }

    /// Whether `revision` is defined.
    pub fn contains(&self, revision: &Revision) -> bool {
        self.positions.contains_key(revision)
    }

    /// Resolve a selector to a revision defined in this registry.
    pub fn resolve(&self, selector: &RevisionSelector) -> Result<Revision, MigrationError> {
        match selector {
            RevisionSelector::Head => Ok(self.head().revision.clone()),
            RevisionSelector::Pinned(revision) if self.contains(revision) => Ok(revision.clone()),
            RevisionSelector::Pinned(revision) => Err(MigrationError::UnknownRevision {
                revision: revision.clone(),
            }),
        }
    }

    /// Whether `ancestor` comes at or before `revision` in the chain.
    pub fn is_ancestor(&self, ancestor: &Revision, revision: &Revision) -> bool {
        match (self.positions.get(ancestor), self.positions.get(revision)) {
            (Some(a), Some(r)) => a <= r,
            _ => false,
        }
    }

    /// Steps needed to move from `current` to `target`.
    pub fn upgrade_path(
        &self,
        current: Option<&Revision>,
        target: &Revision,
    ) -> Result<UpgradePath<'_>, MigrationError> {
        let target_index = *self
            .positions
            .get(target)
            .ok_or_else(|| MigrationError::UnknownRevision {
                revision: target.clone(),
            })?;

        let start = match current {
            None => 0,
            Some(current) => match self.positions.get(current) {
                None => return Ok(UpgradePath::Unrelated),
                Some(&index) if index == target_index => return Ok(UpgradePath::UpToDate),
                Some(&index) if index > target_index => return Ok(UpgradePath::Ahead),
                Some(&index) => index + 1,
            },
        };

        Ok(UpgradePath::Steps(
            self.chain[start..=target_index].iter().collect(),
        ))
    }
}

fn list(revisions: &[&Revision]) -> String {
    if revisions.is_empty() {
        return "none".to_string();
    }
    revisions
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Return the head revision of the scripts at `location`.
pub fn locate_head(location: impl AsRef<Path>) -> Result<Revision, MigrationError> {
    Ok(MigrationRegistry::load(location)?.head().revision.clone())
}

/// Return every step at `location`, root first.
pub fn history(location: impl AsRef<Path>) -> Result<Vec<MigrationStep>, MigrationError> {
    Ok(MigrationRegistry::load(location)?.chain)
}
