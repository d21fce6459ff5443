//! Margin removal.
//!
//! Converts a reference venue's raw prices for one market into no-vig
//! ("fair") prices using the multiplicative method: each outcome keeps
//! its share of the total implied probability.

use serde::{Deserialize, Serialize};

use crate::types::{same_point, Outcome};

/// Fair price for one outcome of a de-vigged market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairPrice {
    pub name: String,
    pub point: Option<f64>,
    pub price: f64,
}

/// Fair prices for every outcome of one market, keyed by name and line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairPriceMap {
    prices: Vec<FairPrice>,
    /// Total raw implied probability minus one.
    overround: f64,
}

impl FairPriceMap {
    /// Fair price for the outcome `name` at `point`.
    pub fn get(&self, name: &str, point: Option<f64>) -> Option<f64> {
        self.prices
            .iter()
            .find(|p| p.name == name && same_point(p.point, point))
            .map(|p| p.price)
    }

    /// Venue margin that was removed.
    pub fn overround(&self) -> f64 {
        self.overround
    }

    fn insert(&mut self, fair: FairPrice) {
        match self
            .prices
            .iter_mut()
            .find(|p| p.name == fair.name && same_point(p.point, fair.point))
        {
            Some(existing) => existing.price = fair.price,
            None => self.prices.push(fair),
        }
    }
}

/// Remove the margin from one market's prices.
///
/// Returns `None` ("unavailable") when fewer than two outcomes are given,
/// when any price is not a valid decimal price (finite and above 1.0),
/// or when the total implied probability is zero. Outcomes sharing a
/// name and line collapse to the last one seen.
pub fn devig(outcomes: &[Outcome]) -> Option<FairPriceMap> {
    if outcomes.len() < 2 {
        return None;
    }
    if outcomes.iter().any(|o| !o.price.is_finite() || o.price <= 1.0) {
        return None;
    }

    let total_implied: f64 = outcomes.iter().map(Outcome::implied_probability).sum();
    if total_implied == 0.0 {
        return None;
    }

    let mut map = FairPriceMap {
        prices: Vec::with_capacity(outcomes.len()),
        overround: total_implied - 1.0,
    };
    for outcome in outcomes {
        let fair_probability = outcome.implied_probability() / total_implied;
        map.insert(FairPrice {
            name: outcome.name.clone(),
            point: outcome.point,
            price: 1.0 / fair_probability,
        });
    }

    Some(map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
