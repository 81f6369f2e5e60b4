//! Eventos del ledger y trait `LedgerStore`.

mod store;
mod types;

pub use store::{InMemoryLedgerStore, LedgerError, LedgerLock, LedgerStore};
pub use types::{LedgerEvent, LedgerEventKind, Resolution, StepPhase};
