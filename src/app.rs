//! Application session. Ties the feed, scanner, position book and ledger
//! together for one command run.
//!
//! Every operation takes `now` explicitly; nothing here reads the clock.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::analysis::PerformanceReport;
use crate::config::AppConfig;
use crate::engine::{EdgeScanner, Ledger, PositionBook};
use crate::feed::{MatchRef, OddsFeed};
use crate::strategy::kelly::KellyCalculator;
use crate::types::{BetResult, Opportunity, PositionError, TrackedPosition};

/// Outcome of a settlement sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettleReport {
    pub settled: Vec<(String, BetResult)>,
    /// Positions whose match has no final score yet.
    pub pending: usize,
    pub failed: usize,
}

/// Outcome of a closing-line sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloseReport {
    pub recorded: Vec<(String, f64)>,
    pub unavailable: usize,
    pub failed: usize,
}

pub struct App {
    config: AppConfig,
    feed: Box<dyn OddsFeed>,
    scanner: EdgeScanner,
    sizing: KellyCalculator,
    pub book: PositionBook,
    pub ledger: Ledger,
}

impl App {
    pub fn new(
        config: AppConfig,
        feed: Box<dyn OddsFeed>,
        book: PositionBook,
        ledger: Ledger,
    ) -> Self {
        Self {
            scanner: config.scanner(),
            sizing: config.sizing(),
            config,
            feed,
            book,
            ledger,
        }
    }

    fn reference_venue(&self) -> &str {
        &self.config.scanner.reference_venue
    }

    /// Fetch current odds and scan them.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<Vec<Opportunity>> {
        let matches = self
            .feed
            .fetch_odds(&self.config.feed.sports)
            .await
            .with_context(|| format!("Failed to fetch odds from {}", self.feed.name()))?;
        Ok(self.scanner.scan(&matches, now))
    }

    /// Re-scan and track the opportunity with `opportunity_id`, sized
    /// against the current ledger bankroll.
    pub async fn track(
        &mut self,
        opportunity_id: &str,
        venue_key: Option<&str>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&TrackedPosition> {
        let opportunities = self.scan(now).await?;
        let opportunity = opportunities
            .iter()
            .find(|o| o.id == opportunity_id)
            .with_context(|| format!("No current opportunity with id {opportunity_id}"))?;

        let bankroll = self.ledger.bankroll();
        let position = self
            .book
            .track(opportunity, venue_key, bankroll, &self.sizing, now, note)?;
        Ok(position)
    }

    /// Settle every open position whose match has kicked off, booking each
    /// result in the ledger.
    pub async fn settle_due(&mut self, now: DateTime<Utc>) -> Result<SettleReport> {
        let due: Vec<(String, MatchRef)> = self
            .book
            .awaiting_settlement(now)
            .map(|p| (p.id.clone(), MatchRef::from(&p.opportunity)))
            .collect();

        let mut report = SettleReport::default();
        for (id, target) in due {
            let score = match self.feed.fetch_score(&target).await {
                Ok(Some(score)) => score,
                Ok(None) => {
                    report.pending += 1;
                    continue;
                }
                Err(e) => {
                    warn!(position = %id, error = %e, "Score fetch failed, continuing");
                    report.failed += 1;
                    continue;
                }
            };

            match self.book.settle(&id, &score, now) {
                Ok(settlement) => {
                    report.settled.push((id.clone(), settlement.result));
                }
                Err(PositionError::ScoreNotFinal(_)) | Err(PositionError::ScoreIncomplete(_)) => {
                    report.pending += 1;
                    continue;
                }
                Err(e) => {
                    warn!(position = %id, error = %e, "Settlement failed");
                    report.failed += 1;
                    continue;
                }
            }
            if let Err(e) = self.book_in_ledger(&id, now) {
                warn!(position = %id, error = %e, "Settled but not booked in ledger");
                report.failed += 1;
            }
        }

        info!(
            settled = report.settled.len(),
            pending = report.pending,
            failed = report.failed,
            "Settlement sweep complete"
        );
        Ok(report)
    }

    /// Void a position and book the zero result.
    pub fn void(&mut self, position_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.book.void(position_id, now)?;
        self.book_in_ledger(position_id, now)
    }

    /// Delete a position outright. Anything already booked in the ledger
    /// stays there.
    pub fn delete(&mut self, position_id: &str) -> Result<TrackedPosition> {
        let position = self.book.remove(position_id)?;
        info!(position = %position.id, open = position.is_open(), "Position deleted");
        Ok(position)
    }

    fn book_in_ledger(&mut self, position_id: &str, now: DateTime<Utc>) -> Result<()> {
        let position = self
            .book
            .get(position_id)
            .ok_or_else(|| PositionError::NotFound(position_id.to_string()))?;
        self.ledger.record_settlement(position, now)?;
        Ok(())
    }

    /// Attach closing lines to every position past kickoff that lacks one.
    pub async fn close_due(&mut self, now: DateTime<Utc>) -> Result<CloseReport> {
        let due: Vec<(String, MatchRef)> = self
            .book
            .awaiting_closing(now)
            .map(|p| (p.id.clone(), MatchRef::from(&p.opportunity)))
            .collect();
        let reference = self.reference_venue().to_string();

        let mut report = CloseReport::default();
        for (id, target) in due {
            let snapshot = match self.feed.fetch_closing(&target).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    report.unavailable += 1;
                    continue;
                }
                Err(e) => {
                    warn!(position = %id, error = %e, "Closing fetch failed, continuing");
                    report.failed += 1;
                    continue;
                }
            };

            match self.book.attach_closing(&id, &snapshot, &reference)? {
                Some(line) => report.recorded.push((id, line.clv_pct)),
                None => report.unavailable += 1,
            }
        }

        info!(
            recorded = report.recorded.len(),
            unavailable = report.unavailable,
            failed = report.failed,
            "Closing sweep complete"
        );
        Ok(report)
    }

    pub fn deposit(&mut self, venue: &str, amount: Decimal, now: DateTime<Utc>) -> Result<()> {
        self.ensure_venue(venue)?;
        self.ledger.deposit(venue, amount, now)?;
        Ok(())
    }

    pub fn withdraw(&mut self, venue: &str, amount: Decimal, now: DateTime<Utc>) -> Result<()> {
        self.ensure_venue(venue)?;
        self.ledger.withdraw(venue, amount, now)?;
        Ok(())
    }

    /// Signed manual correction to a venue balance.
    pub fn adjust(
        &mut self,
        venue: &str,
        amount: Decimal,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_venue(venue)?;
        self.ledger.adjust(venue, amount, note, now)?;
        Ok(())
    }

    fn ensure_venue(&self, venue: &str) -> Result<()> {
        anyhow::ensure!(
            self.config.venues.iter().any(|v| v.key == venue),
            "Unknown venue {venue}; configured venues: {}",
            self.config
                .venues
                .iter()
                .map(|v| v.key.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport::from_positions(self.book.positions())
    }
}
