//! Odds feeds.
//!
//! Defines the `OddsFeed` trait the engine reads from and provides:
//! - `SnapshotFeed`: JSON files on disk in the odds-API wire format
//! - `OddsApiFeed`: the live odds API over HTTP

pub mod odds_api;
pub mod snapshot;
pub mod wire;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{FinalScore, MatchSnapshot, Opportunity};

pub use odds_api::{OddsApiConfig, OddsApiError, OddsApiFeed};
pub use snapshot::SnapshotFeed;

/// Identifies one match when asking a feed for its score or closing odds.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRef {
    pub id: String,
    pub sport_key: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
}

impl From<&Opportunity> for MatchRef {
    fn from(o: &Opportunity) -> Self {
        Self {
            id: o.match_id.clone(),
            sport_key: o.sport_key.clone(),
            home_team: o.home_team.clone(),
            away_team: o.away_team.clone(),
            kickoff: o.kickoff,
        }
    }
}

/// Source of odds snapshots, final scores and closing odds.
///
/// `Ok(None)` means the feed answered but has nothing for that match yet.
#[async_trait]
pub trait OddsFeed: Send + Sync {
    /// Current odds for every match in `sports` (all sports when empty).
    async fn fetch_odds(&self, sports: &[String]) -> Result<Vec<MatchSnapshot>>;

    /// Latest score record for a match.
    async fn fetch_score(&self, target: &MatchRef) -> Result<Option<FinalScore>>;

    /// The match as quoted at kickoff.
    async fn fetch_closing(&self, target: &MatchRef) -> Result<Option<MatchSnapshot>>;

    /// Feed name for logging.
    fn name(&self) -> &str;
}
