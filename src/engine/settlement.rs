//! Settlement: resolves a position against a final score.
//!
//! Resolution is a pure function of the typed selection and the two
//! scores. Settling writes the result, the scores and both P/L figures
//! onto the position in one step and moves it to `closed`; a position
//! that is already closed is rejected, never re-settled.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::types::{
    BetResult, FinalScore, PositionError, ResultPick, Selection, Settlement, TeamSide,
    TotalDirection, TrackedPosition, POINT_EPSILON,
};

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve `selection` against a full-time score.
///
/// Match-result selections are never a push: a home or away pick on a
/// draw loses. Totals and handicaps push when the adjusted figures land
/// exactly on the line.
pub fn resolve(selection: &Selection, home: u32, away: u32) -> BetResult {
    match selection {
        Selection::MatchResult { pick, .. } => {
            let won = match pick {
                ResultPick::Home => home > away,
                ResultPick::Away => away > home,
                ResultPick::Draw => home == away,
            };
            if won {
                BetResult::Won
            } else {
                BetResult::Lost
            }
        }
        Selection::Total { direction, line } => {
            let total = f64::from(home) + f64::from(away);
            let margin = match direction {
                TotalDirection::Over => total - line,
                TotalDirection::Under => line - total,
            };
            against_line(margin)
        }
        Selection::Handicap { side, point, .. } => {
            let (team, opponent) = match side {
                TeamSide::Home => (home, away),
                TeamSide::Away => (away, home),
            };
            against_line(f64::from(team) + point - f64::from(opponent))
        }
    }
}

fn against_line(margin: f64) -> BetResult {
    if margin.abs() < POINT_EPSILON {
        BetResult::Push
    } else if margin > 0.0 {
        BetResult::Won
    } else {
        BetResult::Lost
    }
}

// ---------------------------------------------------------------------------
// Profit and loss
// ---------------------------------------------------------------------------

/// P/L of `stake` at `price` for `result`, commission taken from winnings.
pub fn profit_and_loss(result: BetResult, stake: f64, price: f64, commission: f64) -> f64 {
    match result {
        BetResult::Won => stake * (price - 1.0) * (1.0 - commission),
        BetResult::Lost => -stake,
        BetResult::Push | BetResult::Void => 0.0,
    }
}

fn settlement_for(
    position: &TrackedPosition,
    result: BetResult,
    home_score: Option<u32>,
    away_score: Option<u32>,
    now: DateTime<Utc>,
) -> Settlement {
    Settlement {
        result,
        home_score,
        away_score,
        flat_pl: profit_and_loss(result, position.flat_stake, position.price, position.commission),
        kelly_pl: profit_and_loss(result, position.kelly_stake, position.price, position.commission),
        settled_at: now,
    }
}

// ---------------------------------------------------------------------------
// Settling positions
// ---------------------------------------------------------------------------

/// Settle an open position against `score`.
///
/// `ScoreNotFinal` and `ScoreIncomplete` leave the position untouched.
pub fn settle<'a>(
    position: &'a mut TrackedPosition,
    score: &FinalScore,
    now: DateTime<Utc>,
) -> Result<&'a Settlement, PositionError> {
    if !position.is_open() {
        return Err(PositionError::AlreadyClosed(position.id.clone()));
    }
    if !score.completed {
        return Err(PositionError::ScoreNotFinal(position.id.clone()));
    }
    let Some((home, away)) = score.scores() else {
        warn!(position = %position.id, "Completed match reported without scores");
        return Err(PositionError::ScoreIncomplete(position.id.clone()));
    };

    let result = resolve(position.selection(), home, away);
    let settlement = settlement_for(position, result, Some(home), Some(away), now);
    position.close(settlement)?;

    info!(
        position = %position.id,
        selection = %position.selection(),
        score = format!("{home}-{away}"),
        result = %result,
        "Position settled"
    );

    closed_settlement(position)
}

/// Close a position as void: both P/L figures are zero.
pub fn void(
    position: &mut TrackedPosition,
    now: DateTime<Utc>,
) -> Result<&Settlement, PositionError> {
    let settlement = settlement_for(position, BetResult::Void, None, None, now);
    position.close(settlement)?;
    info!(position = %position.id, "Position voided");
    closed_settlement(position)
}

fn closed_settlement(position: &TrackedPosition) -> Result<&Settlement, PositionError> {
    position
        .settlement()
        .ok_or_else(|| PositionError::NotFound(position.id.clone()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
