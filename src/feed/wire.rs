//! Odds-feed wire format.
//!
//! Mirrors the JSON returned by the odds API's `/odds`, `/scores` and
//! `/odds-history` endpoints, and maps it onto the crate's snapshot types.
//! Market keys the crate does not price are dropped here. Lists are
//! decoded one record at a time, so a malformed event only drops itself.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{FinalScore, Market, MarketKind, MatchSnapshot, Outcome, VenueQuote};

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WireEvent {
    pub id: String,
    pub sport_key: String,
    #[serde(default)]
    pub sport_title: Option<String>,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<WireBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireBookmaker {
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub markets: Vec<WireMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<WireOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireOutcome {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
}

/// `/odds-history` envelope: one snapshot of every event at `timestamp`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireHistory {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl WireHistory {
    pub fn events(self) -> Vec<WireEvent> {
        decode_each(self.data, "odds-history event")
    }
}

/// Decode every element of a feed list on its own, logging and skipping
/// the ones that do not fit `T`.
pub fn decode_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string();
            match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(what, index, id = %id, error = %e, "Skipping malformed feed record");
                    None
                }
            }
        })
        .collect()
}

impl WireEvent {
    pub fn into_snapshot(self) -> MatchSnapshot {
        let venues = self
            .bookmakers
            .into_iter()
            .map(|b| VenueQuote {
                markets: b
                    .markets
                    .into_iter()
                    .filter_map(|m| wire_market(&b.key, m))
                    .collect(),
                venue: b.key,
            })
            .collect();

        MatchSnapshot {
            sport: self.sport_title.unwrap_or_else(|| self.sport_key.clone()),
            id: self.id,
            sport_key: self.sport_key,
            home_team: self.home_team,
            away_team: self.away_team,
            kickoff: self.commence_time,
            venues,
        }
    }

    /// Whether this event is the one identified by `match_id` (or, failing
    /// that, by its two team names). History ids may carry a `:`-suffix.
    pub fn is_match(&self, match_id: &str, home_team: &str, away_team: &str) -> bool {
        let base = |id: &str| id.split(':').next().unwrap_or(id).to_string();
        base(&self.id) == base(match_id)
            || (self.home_team == home_team && self.away_team == away_team)
    }
}

fn wire_market(venue: &str, market: WireMarket) -> Option<Market> {
    let Some(kind) = MarketKind::from_feed_key(&market.key) else {
        debug!(venue, market = %market.key, "Skipping unsupported market");
        return None;
    };
    let outcomes = market
        .outcomes
        .into_iter()
        .map(|o| Outcome {
            name: o.name,
            price: o.price,
            point: o.point,
        })
        .collect();
    Some(Market::new(kind, outcomes))
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WireScoreEvent {
    pub id: String,
    #[serde(default)]
    pub sport_key: Option<String>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub scores: Option<Vec<WireScore>>,
}

/// Scores arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct WireScore {
    pub name: String,
    pub score: String,
}

impl WireScoreEvent {
    pub fn is_match(&self, match_id: &str, home_team: &str, away_team: &str) -> bool {
        self.id == match_id || (self.home_team == home_team && self.away_team == away_team)
    }

    /// Unparseable or absent team scores become `None`.
    pub fn final_score(&self) -> FinalScore {
        let team_score = |team: &str| -> Option<u32> {
            self.scores
                .as_ref()?
                .iter()
                .find(|s| s.name == team)?
                .score
                .trim()
                .parse()
                .ok()
        };
        FinalScore {
            completed: self.completed,
            home: team_score(&self.home_team),
            away: team_score(&self.away_team),
        }
    }
}

/// Pick the score record for a match: exact event id wins over a team-name
/// match anywhere in the list.
pub fn find_score<'a>(
    events: &'a [WireScoreEvent],
    match_id: &str,
    home_team: &str,
    away_team: &str,
) -> Option<&'a WireScoreEvent> {
    events.iter().find(|e| e.id == match_id).or_else(|| {
        events
            .iter()
            .find(|e| e.is_match(match_id, home_team, away_team))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "id": "abc123",
        "sport_key": "soccer_epl",
        "sport_title": "EPL",
        "commence_time": "2026-03-01T15:00:00Z",
        "home_team": "Arsenal",
        "away_team": "Chelsea",
        "bookmakers": [
            {
                "key": "pinnacle",
                "title": "Pinnacle",
                "last_update": "2026-03-01T10:00:00Z",
                "markets": [
                    {"key": "h2h", "outcomes": [
                        {"name": "Arsenal", "price": 2.0},
                        {"name": "Chelsea", "price": 4.0},
                        {"name": "Draw", "price": 3.6}
                    ]},
                    {"key": "totals", "outcomes": [
                        {"name": "Over", "price": 1.95, "point": 2.5},
                        {"name": "Under", "price": 1.95, "point": 2.5}
                    ]},
                    {"key": "btts", "outcomes": [
                        {"name": "Yes", "price": 1.8},
                        {"name": "No", "price": 2.0}
                    ]}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_event_into_snapshot() {
        let event: WireEvent = serde_json::from_str(EVENT).unwrap();
        let snapshot = event.into_snapshot();

        assert_eq!(snapshot.id, "abc123");
        assert_eq!(snapshot.sport, "EPL");
        assert_eq!(snapshot.kickoff.to_rfc3339(), "2026-03-01T15:00:00+00:00");
        let pinnacle = snapshot.venue("pinnacle").unwrap();
        // btts is not a priced market
        assert_eq!(pinnacle.markets.len(), 2);
        let totals = pinnacle.market(MarketKind::OverUnder).unwrap();
        assert_eq!(totals.outcomes[0].point, Some(2.5));
        assert!(pinnacle.market(MarketKind::Handicap).is_none());
    }

    #[test]
    fn test_sport_title_falls_back_to_key() {
        let json = r#"{"id": "x", "sport_key": "basketball_nba",
            "commence_time": "2026-03-01T00:00:00Z",
            "home_team": "A", "away_team": "B"}"#;
        let snapshot = serde_json::from_str::<WireEvent>(json).unwrap().into_snapshot();
        assert_eq!(snapshot.sport, "basketball_nba");
        assert!(snapshot.venues.is_empty());
    }

    #[test]
    fn test_history_id_suffix_matches() {
        let event: WireEvent = serde_json::from_str(EVENT).unwrap();
        assert!(event.is_match("abc123:2026", "x", "y"));
        assert!(event.is_match("other", "Arsenal", "Chelsea"));
        assert!(!event.is_match("other", "Arsenal", "Spurs"));
    }

    #[test]
    fn test_score_parsing() {
        let json = r#"[
            {"id": "e1", "home_team": "Arsenal", "away_team": "Chelsea", "completed": true,
             "scores": [{"name": "Arsenal", "score": "2"}, {"name": "Chelsea", "score": "1"}]},
            {"id": "e2", "home_team": "Spurs", "away_team": "Everton", "completed": true,
             "scores": [{"name": "Spurs", "score": "?"}, {"name": "Everton", "score": "0"}]},
            {"id": "e3", "home_team": "Leeds", "away_team": "Fulham", "completed": false,
             "scores": null}
        ]"#;
        let events: Vec<WireScoreEvent> = serde_json::from_str(json).unwrap();

        assert_eq!(events[0].final_score(), FinalScore::full_time(2, 1));

        let bad = events[1].final_score();
        assert!(bad.completed);
        assert_eq!(bad.home, None);
        assert_eq!(bad.away, Some(0));

        assert_eq!(events[2].final_score(), FinalScore::pending());
    }

    #[test]
    fn test_decode_each_skips_malformed_events() {
        let bad = EVENT
            .replace("\"id\": \"abc123\"", "\"id\": \"broken\"")
            .replace("\"price\": 2.0", "\"price\": null");
        let values: Vec<Value> = serde_json::from_str(&format!("[{bad}, {EVENT}]")).unwrap();

        let events: Vec<WireEvent> = decode_each(values, "odds event");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "abc123");
    }

    #[test]
    fn test_history_events_skip_malformed() {
        let json = format!(
            r#"{{"timestamp": "2026-03-01T15:00:00Z", "data": [{{"id": "no-teams"}}, {EVENT}]}}"#
        );
        let history: WireHistory = serde_json::from_str(&json).unwrap();
        let events = history.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "abc123");
    }

    #[test]
    fn test_find_score_prefers_id() {
        let json = r#"[
            {"id": "old", "home_team": "Arsenal", "away_team": "Chelsea", "completed": true,
             "scores": [{"name": "Arsenal", "score": "0"}, {"name": "Chelsea", "score": "0"}]},
            {"id": "e1", "home_team": "Arsenal", "away_team": "Chelsea", "completed": true,
             "scores": [{"name": "Arsenal", "score": "3"}, {"name": "Chelsea", "score": "0"}]}
        ]"#;
        let events: Vec<WireScoreEvent> = serde_json::from_str(json).unwrap();
        let found = find_score(&events, "e1", "Arsenal", "Chelsea").unwrap();
        assert_eq!(found.id, "e1");

        let by_teams = find_score(&events, "missing", "Arsenal", "Chelsea").unwrap();
        assert_eq!(by_teams.id, "old");
        assert!(find_score(&events, "missing", "Leeds", "Fulham").is_none());
    }
}
