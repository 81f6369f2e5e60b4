pub mod types;
pub use types::{LedgerEntry, LedgerSnapshot};
