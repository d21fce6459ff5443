//! Performance analysis over tracked positions.

pub mod stats;

pub use stats::{by_sport, by_timing, BreakdownRow, PerformanceReport, SummaryStats};
