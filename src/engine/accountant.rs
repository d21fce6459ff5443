//! Accountant: per-venue bankroll ledger.
//!
//! Money is held in `Decimal`. Every balance change is a signed transaction
//! against one venue: deposits, withdrawals and manual adjustments come
//! from the user, bet transactions come from settled positions. Balances
//! are always derived from the transaction list, never stored.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::types::{BetResult, TrackedPosition};

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    BetWin,
    BetLoss,
    BetVoid,
    Adjustment,
}

impl TransactionKind {
    pub fn is_bet(&self) -> bool {
        matches!(
            self,
            TransactionKind::BetWin | TransactionKind::BetLoss | TransactionKind::BetVoid
        )
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::BetWin => "bet win",
            TransactionKind::BetLoss => "bet loss",
            TransactionKind::BetVoid => "bet void",
            TransactionKind::Adjustment => "adjustment",
        };
        write!(f, "{label}")
    }
}

/// A signed balance change: positive for deposits and wins, negative for
/// withdrawals and losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub venue: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Adjustment amount must be non-zero")]
    ZeroAdjustment,

    #[error("Position {0} is still open")]
    PositionOpen(String),

    #[error("Position {0} is already in the ledger")]
    AlreadyRecorded(String),

    #[error("Position {position} has a P/L that cannot be represented: {value}")]
    InvalidProfit { position: String, value: f64 },
}

// ---------------------------------------------------------------------------
// Venue summary
// ---------------------------------------------------------------------------

/// Totals per transaction family for one venue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VenueSummary {
    pub deposits: Decimal,
    /// Absolute amount withdrawn.
    pub withdrawals: Decimal,
    pub adjustments: Decimal,
    pub bet_pl: Decimal,
    pub balance: Decimal,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn deposit(
        &mut self,
        venue: &str,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<&Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        Ok(self.push(venue, TransactionKind::Deposit, amount, None, None, at))
    }

    /// Withdraw a positive `amount`; it is stored negated.
    pub fn withdraw(
        &mut self,
        venue: &str,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<&Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        if amount > self.balance(venue) {
            warn!(
                venue,
                amount = %amount,
                balance = %self.balance(venue),
                "Withdrawal exceeds venue balance"
            );
        }
        Ok(self.push(venue, TransactionKind::Withdrawal, -amount, None, None, at))
    }

    /// Signed manual correction.
    pub fn adjust(
        &mut self,
        venue: &str,
        amount: Decimal,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<&Transaction, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAdjustment);
        }
        Ok(self.push(venue, TransactionKind::Adjustment, amount, None, note, at))
    }

    /// Book the Kelly P/L of a settled position against its venue.
    ///
    /// Each position is booked at most once.
    pub fn record_settlement(
        &mut self,
        position: &TrackedPosition,
        at: DateTime<Utc>,
    ) -> Result<&Transaction, LedgerError> {
        let Some(settlement) = position.settlement() else {
            return Err(LedgerError::PositionOpen(position.id.clone()));
        };
        if self.has_position(&position.id) {
            return Err(LedgerError::AlreadyRecorded(position.id.clone()));
        }

        let amount = Decimal::from_f64(settlement.kelly_pl)
            .ok_or_else(|| LedgerError::InvalidProfit {
                position: position.id.clone(),
                value: settlement.kelly_pl,
            })?
            .round_dp(2);

        let kind = match settlement.result {
            BetResult::Won => TransactionKind::BetWin,
            BetResult::Lost => TransactionKind::BetLoss,
            BetResult::Push | BetResult::Void => TransactionKind::BetVoid,
        };

        let note = Some(format!(
            "{} | {} {}",
            position.opportunity.match_label(),
            position.opportunity.market,
            position.selection()
        ));
        let venue = position.venue_key.clone();
        let tx = self.push(&venue, kind, amount, Some(position.id.clone()), note, at);

        info!(
            venue = %tx.venue,
            position = %position.id,
            kind = %tx.kind,
            amount = %tx.amount,
            "Settlement booked"
        );

        Ok(tx)
    }

    pub fn has_position(&self, position_id: &str) -> bool {
        self.transactions
            .iter()
            .any(|t| t.position_id.as_deref() == Some(position_id))
    }

    pub fn balance(&self, venue: &str) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.venue == venue)
            .map(|t| t.amount)
            .sum()
    }

    /// Balance per venue, for every venue with at least one transaction.
    pub fn balances(&self) -> BTreeMap<String, Decimal> {
        let mut balances = BTreeMap::new();
        for t in &self.transactions {
            *balances.entry(t.venue.clone()).or_insert(Decimal::ZERO) += t.amount;
        }
        balances
    }

    pub fn summary(&self, venue: &str) -> VenueSummary {
        let mut summary = VenueSummary::default();
        for t in self.transactions.iter().filter(|t| t.venue == venue) {
            match t.kind {
                TransactionKind::Deposit => summary.deposits += t.amount,
                TransactionKind::Withdrawal => summary.withdrawals += t.amount.abs(),
                TransactionKind::Adjustment => summary.adjustments += t.amount,
                _ => summary.bet_pl += t.amount,
            }
            summary.balance += t.amount;
        }
        summary
    }

    /// Total bankroll across all venues.
    pub fn total(&self) -> Decimal {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    /// Total bankroll as a float, for stake sizing.
    pub fn bankroll(&self) -> f64 {
        self.total().to_f64().unwrap_or(0.0)
    }

    fn push(
        &mut self,
        venue: &str,
        kind: TransactionKind,
        amount: Decimal,
        position_id: Option<String>,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> &Transaction {
        self.transactions.push(Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            venue: venue.to_string(),
            kind,
            amount,
            position_id,
            note,
            timestamp: at,
        });
        let tx = &self.transactions[self.transactions.len() - 1];
        if !kind.is_bet() {
            info!(venue, kind = %kind, amount = %amount, "Ledger updated");
        }
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FinalScore, MarketKind, Opportunity, ResultPick, Selection, VenueOffer,
    };
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn make_position(price: f64, kelly_stake: f64) -> TrackedPosition {
        let now = Utc::now();
        let offer = VenueOffer {
            venue_key: "betfair_ex_uk".into(),
            venue_name: "Betfair".into(),
            commission: 0.05,
            price,
            net_edge_pct: 4.0,
            kelly_pct: 3.0,
        };
        let opportunity = Opportunity {
            id: "m1-h2h-Arsenal".into(),
            match_id: "m1".into(),
            sport: "EPL".into(),
            sport_key: "soccer_epl".into(),
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            kickoff: now + Duration::hours(2),
            market: MarketKind::MatchResult,
            selection: Selection::MatchResult {
                pick: ResultPick::Home,
                label: "Arsenal".into(),
            },
            outcome_name: "Arsenal".into(),
            point: None,
            venue_key: "betfair_ex_uk".into(),
            venue_name: "Betfair".into(),
            price,
            offers: vec![offer.clone()],
            fair_price: price / 1.05,
            edge_pct: 5.0,
            net_edge_pct: 4.0,
            kelly_pct: 3.0,
        };
        TrackedPosition::open(opportunity, &offer, now, 1.0, kelly_stake, None)
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        ledger.deposit("smarkets", dec!(200), now).unwrap();
        ledger.deposit("betfair_ex_uk", dec!(100), now).unwrap();
        let tx = ledger.withdraw("smarkets", dec!(50), now).unwrap();
        assert_eq!(tx.amount, dec!(-50));
        assert_eq!(tx.kind, TransactionKind::Withdrawal);

        assert_eq!(ledger.balance("smarkets"), dec!(150));
        assert_eq!(ledger.balance("betfair_ex_uk"), dec!(100));
        assert_eq!(ledger.balance("matchbook"), Decimal::ZERO);
        assert_eq!(ledger.total(), dec!(250));
        assert_eq!(ledger.bankroll(), 250.0);
    }

    #[test]
    fn test_amounts_must_be_positive() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        assert_eq!(
            ledger.withdraw("smarkets", dec!(-10), now).unwrap_err(),
            LedgerError::NonPositiveAmount(dec!(-10))
        );
        assert!(ledger.deposit("smarkets", Decimal::ZERO, now).is_err());
        assert!(ledger.adjust("smarkets", Decimal::ZERO, None, now).is_err());
        assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn test_adjustment_is_signed() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        ledger.deposit("matchbook", dec!(100), now).unwrap();
        ledger
            .adjust("matchbook", dec!(-2.50), Some("fee".into()), now)
            .unwrap();
        assert_eq!(ledger.balance("matchbook"), dec!(97.50));
    }

    #[test]
    fn test_record_won_settlement() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        ledger.deposit("betfair_ex_uk", dec!(100), now).unwrap();

        let mut position = make_position(3.0, 5.0);
        crate::engine::settlement::settle(&mut position, &FinalScore::full_time(2, 0), now)
            .unwrap();

        let tx = ledger.record_settlement(&position, now).unwrap();
        assert_eq!(tx.kind, TransactionKind::BetWin);
        assert_eq!(tx.amount, dec!(9.50));
        assert_eq!(tx.position_id.as_deref(), Some(position.id.as_str()));
        assert_eq!(ledger.balance("betfair_ex_uk"), dec!(109.50));
    }

    #[test]
    fn test_record_settlement_once() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let mut position = make_position(2.0, 4.0);
        crate::engine::settlement::settle(&mut position, &FinalScore::full_time(0, 1), now)
            .unwrap();

        let tx = ledger.record_settlement(&position, now).unwrap();
        assert_eq!(tx.kind, TransactionKind::BetLoss);
        assert_eq!(tx.amount, dec!(-4));

        assert_eq!(
            ledger.record_settlement(&position, now).unwrap_err(),
            LedgerError::AlreadyRecorded(position.id.clone())
        );
        assert_eq!(ledger.transactions().len(), 1);
    }

    #[test]
    fn test_open_position_not_recorded() {
        let mut ledger = Ledger::new();
        let position = make_position(2.0, 4.0);
        assert!(matches!(
            ledger.record_settlement(&position, Utc::now()),
            Err(LedgerError::PositionOpen(_))
        ));
    }

    #[test]
    fn test_void_books_zero() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let mut position = make_position(2.0, 4.0);
        crate::engine::settlement::void(&mut position, now).unwrap();
        let tx = ledger.record_settlement(&position, now).unwrap();
        assert_eq!(tx.kind, TransactionKind::BetVoid);
        assert!(tx.amount.is_zero());
    }

    #[test]
    fn test_summary_and_balances() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        ledger.deposit("betfair_ex_uk", dec!(100), now).unwrap();
        ledger.withdraw("betfair_ex_uk", dec!(30), now).unwrap();
        ledger.adjust("betfair_ex_uk", dec!(1), None, now).unwrap();
        ledger.deposit("smarkets", dec!(20), now).unwrap();

        let mut position = make_position(2.0, 10.0);
        crate::engine::settlement::settle(&mut position, &FinalScore::full_time(1, 0), now)
            .unwrap();
        ledger.record_settlement(&position, now).unwrap();

        let summary = ledger.summary("betfair_ex_uk");
        assert_eq!(summary.deposits, dec!(100));
        assert_eq!(summary.withdrawals, dec!(30));
        assert_eq!(summary.adjustments, dec!(1));
        // 10 × 1.0 × 0.95
        assert_eq!(summary.bet_pl, dec!(9.50));
        assert_eq!(summary.balance, dec!(80.50));

        let balances = ledger.balances();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances["smarkets"], dec!(20));
        assert_eq!(ledger.total(), dec!(100.50));
    }
}
