//! Motor de migraciones.
//!
//! `MigrationRunner` recorre un `MigrationPlan` contra el ledger de una red;
//! `Reconciler` resuelve los steps que quedaron ambiguos y hace reset
//! explícito del ledger.

pub mod core;
mod options;
mod reconcile;
mod report;
mod resolve;

pub use self::core::MigrationRunner;
pub use options::{ForcePolicy, RunOptions};
pub use reconcile::Reconciler;
pub use report::{RunHalt, RunReport, StepOutcome, StepReport};
