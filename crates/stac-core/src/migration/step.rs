//! Migration steps and revision tokens.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::MigrationError;

/// Opaque revision token identifying a migration step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Create a revision token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Revision {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Selects a revision in the registry: its head, or an explicitly pinned step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RevisionSelector {
    /// The most recent step in the chain.
    Head,
    /// A specific revision.
    Pinned(Revision),
}

impl std::fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevisionSelector::Head => write!(f, "head"),
            RevisionSelector::Pinned(revision) => write!(f, "{}", revision),
        }
    }
}

impl FromStr for RevisionSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("head") {
            Ok(RevisionSelector::Head)
        } else {
            Ok(RevisionSelector::Pinned(Revision::new(s)))
        }
    }
}

impl From<Revision> for RevisionSelector {
    fn from(revision: Revision) -> Self {
        RevisionSelector::Pinned(revision)
    }
}

/// A single forward-only schema change.
///
/// Steps are immutable once loaded. The `sql` body must be safe to run inside
/// a transaction; the store decides whether it runs at all by comparing the
/// recorded revision with `down_revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    /// Revision token of this step.
    pub revision: Revision,
    /// Predecessor in the chain; `None` for the root.
    pub down_revision: Option<Revision>,
    /// Human-readable summary.
    pub description: String,
    /// Forward SQL.
    pub sql: String,
    /// Script the step was loaded from, if any.
    pub path: Option<PathBuf>,
}

impl MigrationStep {
    /// Create a step with an empty body.
    pub fn new(revision: impl Into<Revision>, down_revision: Option<Revision>) -> Self {
        Self {
            revision: revision.into(),
            down_revision,
            description: String::new(),
            sql: String::new(),
            path: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the forward SQL.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = sql.into();
        self
    }

    /// Whether this is the first step of a chain.
    pub fn is_root(&self) -> bool {
        self.down_revision.is_none()
    }

    /// Parse a step from the text of a migration script.
    ///
    /// The script starts with a block of `-- key: value` comment lines
    /// (`revision`, `down_revision`, `description`). Everything after the
    /// header is the forward SQL.
    pub fn parse(path: &Path, text: &str) -> Result<Self, MigrationError> {
        let malformed = |reason: String| MigrationError::MalformedScript {
            path: path.to_path_buf(),
            reason,
        };

        let mut revision = None;
        let mut down_revision = None;
        let mut description = String::new();
        let mut body_start = text.len();
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                offset += line.len();
                continue;
            }
            let Some(comment) = trimmed.strip_prefix("--") else {
                body_start = offset;
                break;
            };
            offset += line.len();

            let Some((key, value)) = comment.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "revision" => {
                    if value.is_empty() {
                        return Err(malformed("empty revision".to_string()));
                    }
                    revision = Some(Revision::new(value));
                }
                "down_revision" => {
                    down_revision = match value {
                        "" | "none" | "None" => None,
                        other => Some(Revision::new(other)),
                    };
                }
                "description" => description = value.to_string(),
                other => return Err(malformed(format!("unknown header key `{}`", other))),
            }
        }

        let revision = revision.ok_or_else(|| malformed("missing revision header".to_string()))?;
        if down_revision.as_ref() == Some(&revision) {
            return Err(malformed(format!("revision {} names itself as predecessor", revision)));
        }

        Ok(Self {
            revision,
            down_revision,
            description,
            sql: text[body_start.min(text.len())..].trim().to_string(),
            path: Some(path.to_path_buf()),
        })
    }
}
