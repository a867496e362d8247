//! Durable storage for the task ledger.

pub mod fs_atomic;
pub mod ledger_store;

pub use ledger_store::LedgerStore;
