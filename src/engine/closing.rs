//! Closing line value.
//!
//! Prices a position against the reference venue's market at kickoff. The
//! closing market is de-vigged the same way as at scan time, and CLV is the
//! placed raw price against the closing fair price.

use tracing::{debug, info};

use crate::strategy::devig::devig;
use crate::types::{ClosingLine, MatchSnapshot, PositionError, TrackedPosition};

/// `(placed_price / closing_fair - 1) * 100`.
pub fn clv_pct(placed_price: f64, closing_fair: f64) -> f64 {
    (placed_price / closing_fair - 1.0) * 100.0
}

/// Closing line for `position` from a snapshot taken at or after kickoff.
///
/// `None` when the reference venue, the market, or the position's outcome
/// is missing from the snapshot, or the closing market cannot be de-vigged.
pub fn closing_line(
    position: &TrackedPosition,
    snapshot: &MatchSnapshot,
    reference_venue: &str,
) -> Option<ClosingLine> {
    let opportunity = &position.opportunity;
    let market = snapshot
        .venue(reference_venue)?
        .market(opportunity.market)?;
    let outcome = market.find_outcome(&opportunity.outcome_name, opportunity.point)?;
    let fair_price = devig(&market.outcomes)?.get(&opportunity.outcome_name, opportunity.point)?;

    Some(ClosingLine {
        raw_price: outcome.price,
        fair_price,
        clv_pct: clv_pct(position.price, fair_price),
    })
}

/// Compute and record the closing line on `position`.
///
/// `Ok(None)` when the snapshot has no usable closing price; the position
/// is unchanged and the caller may retry with a later snapshot.
pub fn attach(
    position: &mut TrackedPosition,
    snapshot: &MatchSnapshot,
    reference_venue: &str,
) -> Result<Option<ClosingLine>, PositionError> {
    if position.closing().is_some() {
        return Err(PositionError::ClosingAlreadyRecorded(position.id.clone()));
    }

    let Some(line) = closing_line(position, snapshot, reference_venue) else {
        debug!(
            position = %position.id,
            match_id = %snapshot.id,
            reference = reference_venue,
            "Closing price unavailable"
        );
        return Ok(None);
    };

    position.record_closing(line)?;

    info!(
        position = %position.id,
        placed = position.price,
        closing_fair = format!("{:.3}", line.fair_price),
        clv = format!("{:+.1}%", line.clv_pct),
        "Closing line recorded"
    );

    Ok(Some(line))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
