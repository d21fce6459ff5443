//! Offer evaluation.
//!
//! Prices each tradable venue's quote for one outcome against the no-vig
//! reference price, net of the venue's commission, and ranks the offers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use super::kelly::kelly_percent;
use crate::types::{Venue, VenueOffer};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Qualification rules for a best offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Minimum net edge, in percent.
    pub min_net_edge_pct: f64,
    /// Lowest tradable raw price (inclusive).
    pub min_price: f64,
    /// Highest tradable raw price (inclusive).
    pub max_price: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            min_net_edge_pct: 2.0,
            min_price: 1.5,
            max_price: 10.0,
        }
    }
}

impl EdgeConfig {
    /// Whether `offer` clears the edge floor and sits inside the price band.
    pub fn qualifies(&self, offer: &VenueOffer) -> bool {
        offer.net_edge_pct >= self.min_net_edge_pct
            && offer.price >= self.min_price
            && offer.price <= self.max_price
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Price after commission is taken from net winnings (not the stake).
pub fn effective_price(raw_price: f64, commission: f64) -> f64 {
    1.0 + (raw_price - 1.0) * (1.0 - commission)
}

/// Expected value of `price` against `fair_price`, in percent.
pub fn edge_pct(price: f64, fair_price: f64) -> f64 {
    (price / fair_price - 1.0) * 100.0
}

/// A venue's raw quote for the outcome being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct Quote<'a> {
    pub venue: &'a Venue,
    pub price: f64,
}

/// Evaluate one quote against the fair price.
pub fn evaluate_offer(fair_price: f64, quote: &Quote<'_>) -> VenueOffer {
    let effective = effective_price(quote.price, quote.venue.commission);
    VenueOffer {
        venue_key: quote.venue.key.clone(),
        venue_name: quote.venue.name.clone(),
        commission: quote.venue.commission,
        price: quote.price,
        net_edge_pct: edge_pct(effective, fair_price),
        kelly_pct: kelly_percent(effective, fair_price),
    }
}

/// Evaluate every quote and rank by net edge, best first.
///
/// The sort is stable: equal edges keep the order the quotes came in.
pub fn evaluate_offers(fair_price: f64, quotes: &[Quote<'_>]) -> Vec<VenueOffer> {
    let mut offers: Vec<VenueOffer> = quotes
        .iter()
        .map(|q| evaluate_offer(fair_price, q))
        .collect();

    offers.sort_by(|a, b| {
        b.net_edge_pct
            .partial_cmp(&a.net_edge_pct)
            .unwrap_or(Ordering::Equal)
    });

    if let Some(best) = offers.first() {
        debug!(
            fair_price = format!("{:.3}", fair_price),
            offers = offers.len(),
            best_venue = %best.venue_key,
            best_net_edge = format!("{:.2}%", best.net_edge_pct),
            "Offers ranked"
        );
    }

    offers
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
