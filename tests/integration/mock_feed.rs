//! Mock odds feed for integration testing.
//!
//! Provides a deterministic `OddsFeed` whose odds, scores and closing
//! snapshots are set from test code. Clones share state, so a test can
//! keep a handle after boxing one copy into an `App`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use valuebet::feed::{MatchRef, OddsFeed};
use valuebet::types::*;

#[derive(Clone, Default)]
pub struct MockFeed {
    odds: Arc<Mutex<Vec<MatchSnapshot>>>,
    scores: Arc<Mutex<HashMap<String, FinalScore>>>,
    closing: Arc<Mutex<HashMap<String, MatchSnapshot>>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockFeed {
    pub fn with_odds(odds: Vec<MatchSnapshot>) -> Self {
        let feed = Self::default();
        *feed.odds.lock().unwrap() = odds;
        feed
    }

    pub fn set_score(&self, match_id: &str, score: FinalScore) {
        self.scores.lock().unwrap().insert(match_id.to_string(), score);
    }

    pub fn set_closing(&self, snapshot: MatchSnapshot) {
        self.closing
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OddsFeed for MockFeed {
    async fn fetch_odds(&self, sports: &[String]) -> Result<Vec<MatchSnapshot>> {
        self.check_error()?;
        Ok(self
            .odds
            .lock()
            .unwrap()
            .iter()
            .filter(|m| sports.is_empty() || sports.contains(&m.sport_key))
            .cloned()
            .collect())
    }

    async fn fetch_score(&self, target: &MatchRef) -> Result<Option<FinalScore>> {
        self.check_error()?;
        Ok(self.scores.lock().unwrap().get(&target.id).copied())
    }

    async fn fetch_closing(&self, target: &MatchRef) -> Result<Option<MatchSnapshot>> {
        self.check_error()?;
        Ok(self.closing.lock().unwrap().get(&target.id).cloned())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Snapshot builders
// ---------------------------------------------------------------------------

pub fn h2h(home: f64, draw: f64, away: f64) -> Market {
    Market::new(
        MarketKind::MatchResult,
        vec![
            Outcome::new("Arsenal", home),
            Outcome::new("Draw", draw),
            Outcome::new("Chelsea", away),
        ],
    )
}

pub fn totals(over: f64, under: f64, line: f64) -> Market {
    Market::new(
        MarketKind::OverUnder,
        vec![
            Outcome::with_point("Over", over, line),
            Outcome::with_point("Under", under, line),
        ],
    )
}

pub fn quote(venue: &str, markets: Vec<Market>) -> VenueQuote {
    VenueQuote {
        venue: venue.to_string(),
        markets,
    }
}

pub fn make_match(id: &str, kickoff: DateTime<Utc>, venues: Vec<VenueQuote>) -> MatchSnapshot {
    MatchSnapshot {
        id: id.to_string(),
        sport_key: "soccer_epl".into(),
        sport: "EPL".into(),
        home_team: "Arsenal".into(),
        away_team: "Chelsea".into(),
        kickoff,
        venues,
    }
}
