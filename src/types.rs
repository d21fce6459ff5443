//! Shared types for the VALUEBET engine.
//!
//! These types form the data model used across all modules: feed
//! snapshots coming in, opportunities going out, and the tracked
//! positions that live between a scan and a settlement. They are kept
//! free of engine logic so that strategy, engine and storage modules can
//! depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing handicap/total lines across venues.
pub const POINT_EPSILON: f64 = 1e-9;

/// Whether two optional lines refer to the same handicap/total.
pub fn same_point(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => (x - y).abs() < POINT_EPSILON,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Feed snapshot
// ---------------------------------------------------------------------------

/// Kind of betting market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketKind {
    MatchResult,
    OverUnder,
    Handicap,
}

impl MarketKind {
    pub const ALL: &'static [MarketKind] = &[
        MarketKind::MatchResult,
        MarketKind::OverUnder,
        MarketKind::Handicap,
    ];

    /// Market key used by the odds feed wire format.
    pub fn feed_key(&self) -> &'static str {
        match self {
            MarketKind::MatchResult => "h2h",
            MarketKind::OverUnder => "totals",
            MarketKind::Handicap => "spreads",
        }
    }

    /// Map a feed market key back to a kind. Unknown keys yield `None`.
    pub fn from_feed_key(key: &str) -> Option<Self> {
        match key {
            "h2h" => Some(MarketKind::MatchResult),
            "totals" => Some(MarketKind::OverUnder),
            "spreads" => Some(MarketKind::Handicap),
            _ => None,
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::MatchResult => write!(f, "Match Result"),
            MarketKind::OverUnder => write!(f, "Over/Under"),
            MarketKind::Handicap => write!(f, "Handicap"),
        }
    }
}

/// One selectable result within a market at one venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    /// Decimal price.
    pub price: f64,
    /// Handicap or total line, when the market carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

impl Outcome {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
            point: None,
        }
    }

    pub fn with_point(name: impl Into<String>, price: f64, point: f64) -> Self {
        Self {
            name: name.into(),
            price,
            point: Some(point),
        }
    }

    /// Raw implied probability, margin included.
    pub fn implied_probability(&self) -> f64 {
        1.0 / self.price
    }

    /// Whether this outcome is the same selection as `name` at `point`.
    pub fn matches(&self, name: &str, point: Option<f64>) -> bool {
        self.name == name && same_point(self.point, point)
    }
}

/// A betting market quoted by one venue at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub kind: MarketKind,
    pub outcomes: Vec<Outcome>,
}

impl Market {
    pub fn new(kind: MarketKind, outcomes: Vec<Outcome>) -> Self {
        Self { kind, outcomes }
    }

    pub fn find_outcome(&self, name: &str, point: Option<f64>) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.matches(name, point))
    }
}

/// A tradable venue and its commission on net winnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub key: String,
    pub name: String,
    /// Fraction of net winnings kept by the venue, in [0, 1).
    pub commission: f64,
}

impl Venue {
    pub fn new(key: impl Into<String>, name: impl Into<String>, commission: f64) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            commission,
        }
    }
}

/// All markets one venue quotes for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueQuote {
    /// Venue key, e.g. "pinnacle" or "smarkets".
    pub venue: String,
    pub markets: Vec<Market>,
}

impl VenueQuote {
    pub fn market(&self, kind: MarketKind) -> Option<&Market> {
        self.markets.iter().find(|m| m.kind == kind)
    }
}

/// A match and every venue quote for it at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub id: String,
    pub sport_key: String,
    /// Competition label, e.g. "EPL".
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub venues: Vec<VenueQuote>,
}

impl fmt::Display for MatchSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}, {} venues)",
            self.sport,
            self.label(),
            self.kickoff.format("%Y-%m-%d %H:%M"),
            self.venues.len(),
        )
    }
}

impl MatchSnapshot {
    /// "Home vs Away".
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    pub fn venue(&self, key: &str) -> Option<&VenueQuote> {
        self.venues.iter().find(|v| v.venue == key)
    }
}

/// Final score record from a results feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub completed: bool,
    pub home: Option<u32>,
    pub away: Option<u32>,
}

impl FinalScore {
    /// A completed match with both scores known.
    pub fn full_time(home: u32, away: u32) -> Self {
        Self {
            completed: true,
            home: Some(home),
            away: Some(away),
        }
    }

    /// A match that has not finished yet.
    pub fn pending() -> Self {
        Self {
            completed: false,
            home: None,
            away: None,
        }
    }

    /// Both scores, if present.
    pub fn scores(&self) -> Option<(u32, u32)> {
        Some((self.home?, self.away?))
    }
}

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// Which team a handicap is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Home,
    Away,
}

/// A match-result pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultPick {
    Home,
    Away,
    Draw,
}

/// Direction of a totals bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TotalDirection {
    Over,
    Under,
}

impl fmt::Display for TotalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalDirection::Over => write!(f, "Over"),
            TotalDirection::Under => write!(f, "Under"),
        }
    }
}

/// A typed selection, built once when an opportunity is created and
/// carried unchanged through to settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Selection {
    MatchResult { pick: ResultPick, label: String },
    Total { direction: TotalDirection, line: f64 },
    Handicap { side: TeamSide, team: String, point: f64 },
}

impl Selection {
    /// Type an outcome of `kind` for a match between `home_team` and
    /// `away_team`. Returns `None` when the outcome cannot be mapped onto
    /// the match (unknown team, missing line).
    pub fn from_outcome(
        kind: MarketKind,
        outcome: &Outcome,
        home_team: &str,
        away_team: &str,
    ) -> Option<Self> {
        let name = outcome.name.trim();
        match kind {
            MarketKind::MatchResult => {
                let pick = if name.eq_ignore_ascii_case(home_team) {
                    ResultPick::Home
                } else if name.eq_ignore_ascii_case(away_team) {
                    ResultPick::Away
                } else if name.eq_ignore_ascii_case("draw") {
                    ResultPick::Draw
                } else {
                    return None;
                };
                Some(Selection::MatchResult {
                    pick,
                    label: outcome.name.clone(),
                })
            }
            MarketKind::OverUnder => {
                let direction = if name.eq_ignore_ascii_case("over") {
                    TotalDirection::Over
                } else if name.eq_ignore_ascii_case("under") {
                    TotalDirection::Under
                } else {
                    return None;
                };
                Some(Selection::Total {
                    direction,
                    line: outcome.point?,
                })
            }
            MarketKind::Handicap => {
                let side = if name.eq_ignore_ascii_case(home_team) {
                    TeamSide::Home
                } else if name.eq_ignore_ascii_case(away_team) {
                    TeamSide::Away
                } else {
                    return None;
                };
                Some(Selection::Handicap {
                    side,
                    team: outcome.name.clone(),
                    point: outcome.point?,
                })
            }
        }
    }

    pub fn market_kind(&self) -> MarketKind {
        match self {
            Selection::MatchResult { .. } => MarketKind::MatchResult,
            Selection::Total { .. } => MarketKind::OverUnder,
            Selection::Handicap { .. } => MarketKind::Handicap,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::MatchResult { label, .. } => write!(f, "{label}"),
            Selection::Total { direction, line } => write!(f, "{direction} {line}"),
            Selection::Handicap { team, point, .. } => {
                let sign = if *point > 0.0 { "+" } else { "" };
                write!(f, "{team} {sign}{point}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// One tradable venue's price for an opportunity, evaluated against the
/// opportunity's fair price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueOffer {
    pub venue_key: String,
    pub venue_name: String,
    /// Commission rate on net winnings.
    pub commission: f64,
    /// Raw quoted decimal price.
    pub price: f64,
    /// Expected value after commission, in percent.
    pub net_edge_pct: f64,
    /// Full-Kelly stake, in percent of bankroll (floored at zero).
    pub kelly_pct: f64,
}

impl fmt::Display for VenueOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:.2} (net {:+.2}% | kelly {:.2}%)",
            self.venue_name, self.price, self.net_edge_pct, self.kelly_pct,
        )
    }
}

/// A qualifying mispricing on one outcome of one market of one match.
///
/// Created fresh on every scan and never mutated; the best offer's fields
/// are promoted to the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub match_id: String,
    pub sport: String,
    pub sport_key: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub market: MarketKind,
    pub selection: Selection,
    /// Outcome name as quoted by the feed (used to find it again at close).
    pub outcome_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,

    // Best offer
    pub venue_key: String,
    pub venue_name: String,
    pub price: f64,

    /// Every tradable offer, ranked by net edge (best first).
    pub offers: Vec<VenueOffer>,

    /// No-vig reference price.
    pub fair_price: f64,
    /// Edge of the best raw price before commission, in percent.
    pub edge_pct: f64,
    pub net_edge_pct: f64,
    pub kelly_pct: f64,
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | {} {} | {} @ {:.2} fair={:.3} | edge={:+.2}% net={:+.2}% | kelly={:.2}%",
            self.sport,
            self.match_label(),
            self.market,
            self.selection,
            self.venue_name,
            self.price,
            self.fair_price,
            self.edge_pct,
            self.net_edge_pct,
            self.kelly_pct,
        )
    }
}

impl Opportunity {
    pub fn match_label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    pub fn best_offer(&self) -> Option<&VenueOffer> {
        self.offers.first()
    }

    /// The offer from a specific venue, if that venue quoted this outcome.
    pub fn offer(&self, venue_key: &str) -> Option<&VenueOffer> {
        self.offers.iter().find(|o| o.venue_key == venue_key)
    }
}

// ---------------------------------------------------------------------------
// Tracked positions
// ---------------------------------------------------------------------------

/// Settlement outcome of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetResult {
    Won,
    Lost,
    Push,
    Void,
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetResult::Won => write!(f, "won"),
            BetResult::Lost => write!(f, "lost"),
            BetResult::Push => write!(f, "push"),
            BetResult::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// How long before kickoff a position was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimingBucket {
    #[serde(rename = "48hr+")]
    Over48h,
    #[serde(rename = "24-48hr")]
    From24To48h,
    #[serde(rename = "12-24hr")]
    From12To24h,
    #[serde(rename = "<12hr")]
    Under12h,
}

impl TimingBucket {
    pub const ALL: &'static [TimingBucket] = &[
        TimingBucket::Over48h,
        TimingBucket::From24To48h,
        TimingBucket::From12To24h,
        TimingBucket::Under12h,
    ];

    pub fn from_hours(hours_before_kickoff: f64) -> Self {
        if hours_before_kickoff >= 48.0 {
            TimingBucket::Over48h
        } else if hours_before_kickoff >= 24.0 {
            TimingBucket::From24To48h
        } else if hours_before_kickoff >= 12.0 {
            TimingBucket::From12To24h
        } else {
            TimingBucket::Under12h
        }
    }
}

impl fmt::Display for TimingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingBucket::Over48h => write!(f, "48hr+"),
            TimingBucket::From24To48h => write!(f, "24-48hr"),
            TimingBucket::From12To24h => write!(f, "12-24hr"),
            TimingBucket::Under12h => write!(f, "<12hr"),
        }
    }
}

/// Result fields set once when a position closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub result: BetResult,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub flat_pl: f64,
    pub kelly_pl: f64,
    pub settled_at: DateTime<Utc>,
}

/// Reference price at kickoff and the position's value against it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosingLine {
    pub raw_price: f64,
    pub fair_price: f64,
    /// `(placed_price / closing_fair - 1) * 100`.
    pub clv_pct: f64,
}

impl ClosingLine {
    /// Whether the placed price beat the closing fair price.
    pub fn beat_close(&self) -> bool {
        self.clv_pct > 0.0
    }
}

/// An opportunity the user acted on.
///
/// The fair price at placement, the status, and the settlement/closing
/// records are only reachable through guarded methods: the fair price is
/// frozen at construction and each record can be written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub id: String,
    pub opportunity: Opportunity,
    pub placed_at: DateTime<Utc>,
    fair_price_at_bet: f64,

    // Chosen offer
    pub venue_key: String,
    pub venue_name: String,
    pub price: f64,
    pub commission: f64,

    pub hours_before_kickoff: f64,
    pub timing_bucket: TimingBucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub flat_stake: f64,
    pub kelly_stake: f64,

    status: PositionStatus,
    #[serde(default)]
    settlement: Option<Settlement>,
    #[serde(default)]
    closing: Option<ClosingLine>,
}

impl fmt::Display for TrackedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} {} | {} @ {:.2} | stake flat={:.2} kelly={:.2} | {}",
            self.opportunity.match_label(),
            self.opportunity.market,
            self.opportunity.selection,
            self.venue_name,
            self.price,
            self.flat_stake,
            self.kelly_stake,
            match (&self.settlement, self.status) {
                (Some(s), _) => format!("{} ({:+.2})", s.result, s.kelly_pl),
                (None, PositionStatus::Open) => "open".to_string(),
                (None, PositionStatus::Closed) => "closed".to_string(),
            },
        )
    }
}

impl TrackedPosition {
    /// Open a position on `offer` of `opportunity`, freezing the fair price.
    pub fn open(
        opportunity: Opportunity,
        offer: &VenueOffer,
        placed_at: DateTime<Utc>,
        flat_stake: f64,
        kelly_stake: f64,
        note: Option<String>,
    ) -> Self {
        let hours_before_kickoff =
            (opportunity.kickoff - placed_at).num_seconds() as f64 / 3600.0;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fair_price_at_bet: opportunity.fair_price,
            venue_key: offer.venue_key.clone(),
            venue_name: offer.venue_name.clone(),
            price: offer.price,
            commission: offer.commission,
            hours_before_kickoff,
            timing_bucket: TimingBucket::from_hours(hours_before_kickoff),
            note,
            flat_stake,
            kelly_stake: kelly_stake.max(0.0),
            status: PositionStatus::Open,
            settlement: None,
            closing: None,
            opportunity,
            placed_at,
        }
    }

    pub fn fair_price_at_bet(&self) -> f64 {
        self.fair_price_at_bet
    }

    pub fn status(&self) -> PositionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    pub fn closing(&self) -> Option<&ClosingLine> {
        self.closing.as_ref()
    }

    pub fn result(&self) -> Option<BetResult> {
        self.settlement.as_ref().map(|s| s.result)
    }

    pub fn clv_pct(&self) -> Option<f64> {
        self.closing.map(|c| c.clv_pct)
    }

    pub fn selection(&self) -> &Selection {
        &self.opportunity.selection
    }

    pub fn kickoff(&self) -> DateTime<Utc> {
        self.opportunity.kickoff
    }

    /// Transition `open → closed`. Rejected once closed.
    pub(crate) fn close(&mut self, settlement: Settlement) -> Result<(), PositionError> {
        if self.status == PositionStatus::Closed {
            return Err(PositionError::AlreadyClosed(self.id.clone()));
        }
        self.settlement = Some(settlement);
        self.status = PositionStatus::Closed;
        Ok(())
    }

    /// Attach the closing line. Rejected if one is already recorded.
    pub(crate) fn record_closing(&mut self, closing: ClosingLine) -> Result<(), PositionError> {
        if self.closing.is_some() {
            return Err(PositionError::ClosingAlreadyRecorded(self.id.clone()));
        }
        self.closing = Some(closing);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from position tracking, settlement and closing-line attachment.
///
/// `ScoreNotFinal` and `ScoreIncomplete` mean "not resolvable yet": the
/// position is left untouched and the caller may retry later.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("Position {0} is already closed")]
    AlreadyClosed(String),

    #[error("Match for position {0} has not finished")]
    ScoreNotFinal(String),

    #[error("Final score for position {0} is missing or malformed")]
    ScoreIncomplete(String),

    #[error("Closing line for position {0} is already recorded")]
    ClosingAlreadyRecorded(String),

    #[error("Venue {venue} has no offer on opportunity {opportunity}")]
    UnknownVenue { venue: String, opportunity: String },

    #[error("Position not found: {0}")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
