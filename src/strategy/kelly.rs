//! Kelly criterion position sizing.
//!
//! Full-Kelly fractions are computed per offer against the no-vig win
//! probability; the stake actually recommended is a fixed fraction of
//! full Kelly against the current bankroll.

use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Stake sizing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.30 = 30% of full Kelly).
    pub multiplier: f64,
    /// Fixed unit staked on every position for flat-stake tracking.
    pub flat_stake: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: 0.30,
            flat_stake: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Kelly maths
// ---------------------------------------------------------------------------

/// Full-Kelly fraction for a bet at `effective_price` (commission already
/// deducted) whose true win probability is `1 / fair_price`.
///
/// f* = (bp - q) / b, with b = effective - 1, p = 1/fair, q = 1 - p.
/// Returns 0.0 when the net odds are not positive; may be negative.
pub fn kelly_fraction(effective_price: f64, fair_price: f64) -> f64 {
    let b = effective_price - 1.0;
    if b <= 0.0 || !b.is_finite() || fair_price <= 0.0 {
        return 0.0;
    }
    let p = 1.0 / fair_price;
    let q = 1.0 - p;
    (b * p - q) / b
}

/// Full-Kelly stake in percent of bankroll, floored at zero.
pub fn kelly_percent(effective_price: f64, fair_price: f64) -> f64 {
    kelly_fraction(effective_price, fair_price).max(0.0) * 100.0
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

pub struct KellyCalculator {
    config: KellyConfig,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    /// Stake for an offer with `kelly_pct` full-Kelly percent:
    /// `bankroll × kelly_pct/100 × multiplier`. Never negative.
    pub fn stake(&self, kelly_pct: f64, bankroll: f64) -> f64 {
        if bankroll <= 0.0 || kelly_pct <= 0.0 {
            return 0.0;
        }
        let stake = bankroll * (kelly_pct / 100.0) * self.config.multiplier;

        debug!(
            full_kelly = format!("{:.2}%", kelly_pct),
            multiplier = self.config.multiplier,
            bankroll = format!("{:.2}", bankroll),
            stake = format!("{:.2}", stake),
            "Stake sized"
        );

        stake.max(0.0)
    }

    pub fn flat_stake(&self) -> f64 {
        self.config.flat_stake
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
