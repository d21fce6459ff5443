//! Edge scanner.
//!
//! Walks every match in a feed snapshot, de-vigs each market the reference
//! venue quotes, prices every tradable venue's matching outcome against
//! the fair price, and keeps the outcomes whose best offer clears the edge
//! floor inside the tradable price band.
//!
//! A match with no reference quote, a market that cannot be de-vigged, or
//! an outcome no venue quotes is skipped on its own; it never aborts the
//! rest of the batch.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::strategy::devig::{devig, FairPriceMap};
use crate::strategy::edge::{edge_pct, evaluate_offers, EdgeConfig, Quote};
use crate::types::{MarketKind, MatchSnapshot, Opportunity, Outcome, Selection, Venue};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Longest scan horizon a config may ask for: one year.
pub const MAX_HORIZON_HOURS: i64 = 24 * 365;

/// Scan window and reference venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Venue whose prices are de-vigged into fair prices.
    pub reference_venue: String,
    /// Only matches kicking off within this many hours are scanned.
    pub horizon_hours: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            reference_venue: "pinnacle".to_string(),
            horizon_hours: 48,
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct EdgeScanner {
    config: ScannerConfig,
    edge: EdgeConfig,
    /// Tradable venues, in tie-break order.
    venues: Vec<Venue>,
}

impl EdgeScanner {
    pub fn new(config: ScannerConfig, edge: EdgeConfig, venues: Vec<Venue>) -> Self {
        Self {
            config,
            edge,
            venues,
        }
    }

    /// Scan a batch of matches as of `now`.
    ///
    /// Returns qualifying opportunities ordered by kickoff, soonest first.
    pub fn scan(&self, matches: &[MatchSnapshot], now: DateTime<Utc>) -> Vec<Opportunity> {
        let upcoming: Vec<&MatchSnapshot> = matches
            .iter()
            .filter(|m| self.in_window(m, now))
            .collect();

        let mut opportunities: Vec<Opportunity> = upcoming
            .iter()
            .flat_map(|m| self.scan_match(m))
            .collect();

        opportunities.sort_by_key(|o| o.kickoff);

        info!(
            matches_in = matches.len(),
            in_window = upcoming.len(),
            opportunities = opportunities.len(),
            "Scan complete"
        );

        opportunities
    }

    /// Kickoff strictly in the future and no further out than the horizon.
    /// A horizon past the representable range bounds nothing.
    pub fn in_window(&self, m: &MatchSnapshot, now: DateTime<Utc>) -> bool {
        let horizon = Duration::try_hours(self.config.horizon_hours)
            .and_then(|h| now.checked_add_signed(h));
        m.kickoff > now && horizon.map_or(true, |h| m.kickoff <= h)
    }

    /// All qualifying opportunities in one match, in reference-market order.
    pub fn scan_match(&self, m: &MatchSnapshot) -> Vec<Opportunity> {
        let Some(reference) = m.venue(&self.config.reference_venue) else {
            debug!(
                match_id = %m.id,
                reference = %self.config.reference_venue,
                "No reference quote, skipping match"
            );
            return Vec::new();
        };

        let mut found = Vec::new();
        for market in &reference.markets {
            let Some(fair) = devig(&market.outcomes) else {
                debug!(
                    match_id = %m.id,
                    market = %market.kind,
                    outcomes = market.outcomes.len(),
                    "Reference market unavailable for de-vig"
                );
                continue;
            };
            debug!(
                match_id = %m.id,
                market = %market.kind,
                overround = format!("{:.2}%", fair.overround() * 100.0),
                "Reference market de-vigged"
            );

            for outcome in &market.outcomes {
                if let Some(opportunity) = self.evaluate_outcome(m, market.kind, outcome, &fair) {
                    found.push(opportunity);
                }
            }
        }
        found
    }

    fn evaluate_outcome(
        &self,
        m: &MatchSnapshot,
        kind: MarketKind,
        outcome: &Outcome,
        fair: &FairPriceMap,
    ) -> Option<Opportunity> {
        let Some(selection) = Selection::from_outcome(kind, outcome, &m.home_team, &m.away_team)
        else {
            debug!(
                match_id = %m.id,
                outcome = %outcome.name,
                "Outcome does not map onto the match"
            );
            return None;
        };
        let fair_price = fair.get(&outcome.name, outcome.point)?;

        let quotes: Vec<Quote<'_>> = self
            .venues
            .iter()
            .filter(|venue| venue.key != self.config.reference_venue)
            .filter_map(|venue| {
                let price = m
                    .venue(&venue.key)?
                    .market(kind)?
                    .find_outcome(&outcome.name, outcome.point)?
                    .price;
                (price.is_finite() && price > 1.0).then_some(Quote { venue, price })
            })
            .collect();

        let offers = evaluate_offers(fair_price, &quotes);
        let best = offers.first()?;

        if !self.edge.qualifies(best) {
            return None;
        }

        let raw_edge = edge_pct(best.price, fair_price);

        debug!(
            match_id = %m.id,
            market = %kind,
            selection = %selection,
            venue = %best.venue_key,
            price = best.price,
            fair_price = format!("{:.3}", fair_price),
            net_edge = format!("{:.2}%", best.net_edge_pct),
            "Edge detected"
        );

        Some(Opportunity {
            id: format!("{}-{}-{}", m.id, kind.feed_key(), selection),
            match_id: m.id.clone(),
            sport: m.sport.clone(),
            sport_key: m.sport_key.clone(),
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            kickoff: m.kickoff,
            market: kind,
            selection,
            outcome_name: outcome.name.clone(),
            point: outcome.point,
            venue_key: best.venue_key.clone(),
            venue_name: best.venue_name.clone(),
            price: best.price,
            fair_price,
            edge_pct: raw_edge,
            net_edge_pct: best.net_edge_pct,
            kelly_pct: best.kelly_pct,
            offers,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
