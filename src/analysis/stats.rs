//! Performance statistics over tracked positions.
//!
//! Headline numbers (win rate, P/L and ROI for both staking plans, CLV)
//! plus CLV breakdowns by sport and by how early the position was taken.
//! Rates and ROI are percentages; an empty denominator yields 0.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{BetResult, TimingBucket, TrackedPosition};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total: usize,
    pub settled: usize,
    pub wins: usize,
    pub win_rate: f64,
    /// Positions with a closing line recorded.
    pub with_clv: usize,
    pub avg_clv_pct: f64,
    pub beat_close_rate: f64,
    pub flat_pl: f64,
    /// Flat P/L per unit staked on settled positions.
    pub flat_roi: f64,
    pub kelly_pl: f64,
    pub kelly_staked: f64,
    pub kelly_roi: f64,
}

/// One row of a CLV breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub label: String,
    pub count: usize,
    /// Positions in this group with a closing line recorded.
    pub closed_count: usize,
    pub avg_raw_edge_pct: f64,
    pub avg_clv_pct: f64,
    pub beat_close_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub summary: SummaryStats,
    /// Sorted by count, largest first.
    pub by_sport: Vec<BreakdownRow>,
    /// In bucket order, earliest first; empty buckets omitted.
    pub by_timing: Vec<BreakdownRow>,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl SummaryStats {
    pub fn from_positions(positions: &[TrackedPosition]) -> Self {
        let settled: Vec<&TrackedPosition> =
            positions.iter().filter(|p| p.settlement().is_some()).collect();
        let clv: Vec<f64> = positions.iter().filter_map(|p| p.clv_pct()).collect();

        let wins = settled
            .iter()
            .filter(|p| p.result() == Some(BetResult::Won))
            .count();
        let beat_close = clv.iter().filter(|c| **c > 0.0).count();

        let flat_pl: f64 = settled
            .iter()
            .filter_map(|p| p.settlement())
            .map(|s| s.flat_pl)
            .sum();
        let flat_staked: f64 = settled.iter().map(|p| p.flat_stake).sum();
        let kelly_pl: f64 = settled
            .iter()
            .filter_map(|p| p.settlement())
            .map(|s| s.kelly_pl)
            .sum();
        let kelly_staked: f64 = settled.iter().map(|p| p.kelly_stake).sum();

        Self {
            total: positions.len(),
            settled: settled.len(),
            wins,
            win_rate: pct(wins, settled.len()),
            with_clv: clv.len(),
            avg_clv_pct: mean(clv.iter().copied()),
            beat_close_rate: pct(beat_close, clv.len()),
            flat_pl,
            flat_roi: roi(flat_pl, flat_staked),
            kelly_pl,
            kelly_staked,
            kelly_roi: roi(kelly_pl, kelly_staked),
        }
    }
}

fn roi(pl: f64, staked: f64) -> f64 {
    if staked > 0.0 {
        pl / staked * 100.0
    } else {
        0.0
    }
}

fn breakdown_row(label: String, group: &[&TrackedPosition]) -> BreakdownRow {
    let clv: Vec<f64> = group.iter().filter_map(|p| p.clv_pct()).collect();
    BreakdownRow {
        label,
        count: group.len(),
        closed_count: clv.len(),
        avg_raw_edge_pct: mean(group.iter().map(|p| p.opportunity.edge_pct)),
        avg_clv_pct: mean(clv.iter().copied()),
        beat_close_rate: pct(clv.iter().filter(|c| **c > 0.0).count(), clv.len()),
    }
}

/// CLV breakdown per sport, largest group first. Equal counts keep the
/// order in which each sport first appears.
pub fn by_sport(positions: &[TrackedPosition]) -> Vec<BreakdownRow> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TrackedPosition>> = HashMap::new();
    for p in positions {
        let sport = p.opportunity.sport.as_str();
        if !groups.contains_key(sport) {
            order.push(sport);
        }
        groups.entry(sport).or_default().push(p);
    }

    let mut rows: Vec<BreakdownRow> = order
        .into_iter()
        .map(|sport| breakdown_row(sport.to_string(), &groups[sport]))
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// CLV breakdown per timing bucket.
pub fn by_timing(positions: &[TrackedPosition]) -> Vec<BreakdownRow> {
    TimingBucket::ALL
        .iter()
        .filter_map(|bucket| {
            let group: Vec<&TrackedPosition> = positions
                .iter()
                .filter(|p| p.timing_bucket == *bucket)
                .collect();
            (!group.is_empty()).then(|| breakdown_row(bucket.to_string(), &group))
        })
        .collect()
}

impl PerformanceReport {
    pub fn from_positions(positions: &[TrackedPosition]) -> Self {
        Self {
            summary: SummaryStats::from_positions(positions),
            by_sport: by_sport(positions),
            by_timing: by_timing(positions),
        }
    }

    /// Sport with the highest average CLV, among sports with any CLV data.
    pub fn best_sport(&self) -> Option<&BreakdownRow> {
        self.by_sport
            .iter()
            .filter(|r| r.closed_count > 0)
            .max_by(|a, b| a.avg_clv_pct.total_cmp(&b.avg_clv_pct))
    }

    pub fn worst_sport(&self) -> Option<&BreakdownRow> {
        self.by_sport
            .iter()
            .filter(|r| r.closed_count > 0)
            .min_by(|a, b| a.avg_clv_pct.total_cmp(&b.avg_clv_pct))
    }

    /// Plain-text rendering for the terminal.
    pub fn render(&self) -> String {
        let s = &self.summary;
        let mut parts = Vec::new();

        parts.push(format!("POSITIONS: {} tracked, {} settled", s.total, s.settled));
        parts.push(format!("Win rate: {:.1}% ({} wins)", s.win_rate, s.wins));
        parts.push(format!(
            "Avg CLV: {:+.2}% over {} ({:.1}% beat close)",
            s.avg_clv_pct, s.with_clv, s.beat_close_rate
        ));
        parts.push(format!("Flat:  P/L {:+.2}u, ROI {:+.1}%", s.flat_pl, s.flat_roi));
        parts.push(format!(
            "Kelly: P/L {:+.2} on {:.2} staked, ROI {:+.1}%",
            s.kelly_pl, s.kelly_staked, s.kelly_roi
        ));

        for (title, rows) in [("BY SPORT", &self.by_sport), ("BY TIMING", &self.by_timing)] {
            if rows.is_empty() {
                continue;
            }
            parts.push(format!("{title}:"));
            for r in rows {
                let clv = if r.closed_count > 0 {
                    format!("{:+.1}% CLV, {:.0}% beat close", r.avg_clv_pct, r.beat_close_rate)
                } else {
                    "no CLV yet".to_string()
                };
                parts.push(format!(
                    "  {:<16} {:>3} bets ({} closed) | raw edge {:+.1}% | {}",
                    r.label, r.count, r.closed_count, r.avg_raw_edge_pct, clv
                ));
            }
        }

        if let Some(best) = self.best_sport().filter(|r| r.avg_clv_pct > 0.0) {
            parts.push(format!("Strongest: {} ({:+.1}% CLV)", best.label, best.avg_clv_pct));
        }
        if let Some(worst) = self.worst_sport().filter(|r| r.avg_clv_pct < 0.0) {
            parts.push(format!("Weakest: {} ({:+.1}% CLV)", worst.label, worst.avg_clv_pct));
        }

        parts.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
