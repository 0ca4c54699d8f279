//! Schema migrations and the startup readiness gate.
//!
//! - [`MigrationRegistry`] reads the ordered chain of steps from a directory
//!   of SQL scripts and finds its head.
//! - [`SchemaStore`] records the applied revision and applies one step at a
//!   time under an exclusive lock.
//! - [`SchemaVersionGate`] upgrades to a target revision and then requires
//!   the database to be at the expected revision.
//!
//! # Example
//!
//! ```ignore
//! use stac_core::migration::{RevisionSelector, SchemaVersionGate};
//!
//! let gate = SchemaVersionGate::load("migrations")?;
//! let pinned: RevisionSelector = "407037cb1636".parse()?;
//! gate.ensure_ready(&store, &pinned, &pinned).await?;
//! ```

pub mod error;
pub mod gate;
pub mod registry;
pub mod step;
pub mod store;

pub use error::{ErrorClass, MigrationError};
pub use gate::{ensure_ready, Readiness, SchemaVersionGate, UpgradeReport};
pub use registry::{history, locate_head, MigrationRegistry, UpgradePath};
pub use step::{MigrationStep, Revision, RevisionSelector};
pub use store::{MemorySchemaStore, SchemaStore, StepOutcome};
