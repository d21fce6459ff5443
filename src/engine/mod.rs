//! Core engine: scan → track → settle/close, plus the bankroll ledger.

pub mod accountant;
pub mod closing;
pub mod scanner;
pub mod settlement;
pub mod tracker;

pub use accountant::{Ledger, LedgerError, Transaction, TransactionKind, VenueSummary};
pub use scanner::{EdgeScanner, ScannerConfig};
pub use tracker::{track, PositionBook};
