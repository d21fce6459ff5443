//! Position tracking.
//!
//! Turns an opportunity the user acted on into a `TrackedPosition` sized
//! against the current bankroll, and keeps every position in a single
//! ordered book that routes settlement and closing-line updates by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{closing, settlement};
use crate::strategy::kelly::KellyCalculator;
use crate::types::{
    ClosingLine, FinalScore, MatchSnapshot, Opportunity, PositionError, Settlement,
    TrackedPosition,
};

/// Open a position on `opportunity`.
///
/// `venue_key` picks a specific offer; `None` takes the best one. Stakes
/// are one flat unit and fractional Kelly against `bankroll`.
pub fn track(
    opportunity: &Opportunity,
    venue_key: Option<&str>,
    bankroll: f64,
    sizing: &KellyCalculator,
    placed_at: DateTime<Utc>,
    note: Option<String>,
) -> Result<TrackedPosition, PositionError> {
    let offer = match venue_key {
        Some(key) => opportunity.offer(key),
        None => opportunity.best_offer(),
    }
    .ok_or_else(|| PositionError::UnknownVenue {
        venue: venue_key.unwrap_or(&opportunity.venue_key).to_string(),
        opportunity: opportunity.id.clone(),
    })?;

    let kelly_stake = sizing.stake(offer.kelly_pct, bankroll);
    let position = TrackedPosition::open(
        opportunity.clone(),
        offer,
        placed_at,
        sizing.flat_stake(),
        kelly_stake,
        note,
    );

    info!(
        position = %position.id,
        opportunity = %opportunity.id,
        venue = %position.venue_key,
        price = position.price,
        kelly_stake = format!("{:.2}", position.kelly_stake),
        timing = %position.timing_bucket,
        "Position tracked"
    );

    Ok(position)
}

// ---------------------------------------------------------------------------
// Position book
// ---------------------------------------------------------------------------

/// Every tracked position, in the order they were opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionBook {
    positions: Vec<TrackedPosition>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[TrackedPosition] {
        &self.positions
    }

    pub fn get(&self, id: &str) -> Option<&TrackedPosition> {
        self.positions.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut TrackedPosition, PositionError> {
        self.positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PositionError::NotFound(id.to_string()))
    }

    /// Track `opportunity` and append the new position.
    pub fn track(
        &mut self,
        opportunity: &Opportunity,
        venue_key: Option<&str>,
        bankroll: f64,
        sizing: &KellyCalculator,
        placed_at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<&TrackedPosition, PositionError> {
        let position = track(opportunity, venue_key, bankroll, sizing, placed_at, note)?;
        self.positions.push(position);
        self.positions
            .last()
            .ok_or_else(|| PositionError::NotFound(opportunity.id.clone()))
    }

    pub fn settle(
        &mut self,
        id: &str,
        score: &FinalScore,
        now: DateTime<Utc>,
    ) -> Result<&Settlement, PositionError> {
        settlement::settle(self.get_mut(id)?, score, now)
    }

    /// Delete a position from the book, open or closed.
    pub fn remove(&mut self, id: &str) -> Result<TrackedPosition, PositionError> {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PositionError::NotFound(id.to_string()))?;
        Ok(self.positions.remove(index))
    }

    pub fn void(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Settlement, PositionError> {
        settlement::void(self.get_mut(id)?, now)
    }

    pub fn attach_closing(
        &mut self,
        id: &str,
        snapshot: &MatchSnapshot,
        reference_venue: &str,
    ) -> Result<Option<ClosingLine>, PositionError> {
        closing::attach(self.get_mut(id)?, snapshot, reference_venue)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &TrackedPosition> {
        self.positions.iter().filter(|p| p.is_open())
    }

    /// Open positions whose match has kicked off.
    pub fn awaiting_settlement(&self, now: DateTime<Utc>) -> impl Iterator<Item = &TrackedPosition> {
        self.open_positions().filter(move |p| p.kickoff() <= now)
    }

    /// Positions past kickoff with no closing line yet, open or closed.
    pub fn awaiting_closing(&self, now: DateTime<Utc>) -> impl Iterator<Item = &TrackedPosition> {
        self.positions
            .iter()
            .filter(move |p| p.kickoff() <= now && p.closing().is_none())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
