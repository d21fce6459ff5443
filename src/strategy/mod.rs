//! Pricing strategy: margin removal, offer evaluation, and Kelly sizing.
//!
//! Everything in here is a pure function of its inputs: the scanner and
//! tracker feed it snapshot data and configuration, and nothing reads
//! shared state.

pub mod devig;
pub mod edge;
pub mod kelly;

pub use devig::{devig, FairPrice, FairPriceMap};
pub use edge::{edge_pct, effective_price, evaluate_offer, evaluate_offers, EdgeConfig, Quote};
pub use kelly::{kelly_fraction, kelly_percent, KellyCalculator, KellyConfig};
