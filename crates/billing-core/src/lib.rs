//! Ad billing & serving engine: append-only sponsor ledgers, atomic
//! per-sponsor billing, fairness-weighted ad selection, and derived
//! reporting.
//!
//! The engine is synchronous; concurrency is expressed as one mutex per
//! sponsor so that billable events for different sponsors never contend
//! while events against the same wallet are strictly serialized.

pub mod campaign;
pub mod dedup;
pub mod engine;
pub mod ledger;
pub mod reporting;
pub mod selector;
pub mod wallet;

pub use engine::{AdEngine, EngineError, JournalRecord};
pub use ledger::LedgerBook;
pub use wallet::{Wallet, WalletError};
