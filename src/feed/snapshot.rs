//! File-backed feed.
//!
//! Reads a directory holding `odds.json` (a list of events), `scores.json`
//! (a list of score records) and `closing.json` (an odds-history envelope
//! or a bare list of events). Only `odds.json` is required; a missing
//! scores or closing file simply means nothing is available yet.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use super::wire::{decode_each, find_score, WireEvent, WireHistory, WireScoreEvent};
use super::{MatchRef, OddsFeed};
use crate::types::{FinalScore, MatchSnapshot};

const ODDS_FILE: &str = "odds.json";
const SCORES_FILE: &str = "scores.json";
const CLOSING_FILE: &str = "closing.json";

#[derive(Deserialize)]
#[serde(untagged)]
enum ClosingFile {
    Events(Vec<Value>),
    History(WireHistory),
}

impl ClosingFile {
    fn into_events(self) -> Vec<WireEvent> {
        match self {
            ClosingFile::Events(values) => decode_each(values, "closing event"),
            ClosingFile::History(h) => h.events(),
        }
    }
}

pub struct SnapshotFeed {
    dir: PathBuf,
}

impl SnapshotFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Feed file not present");
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read feed file {}", path.display()))?;
        let parsed = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse feed file {}", path.display()))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl OddsFeed for SnapshotFeed {
    async fn fetch_odds(&self, sports: &[String]) -> Result<Vec<MatchSnapshot>> {
        let values: Vec<Value> = self.read_json(ODDS_FILE).await?.with_context(|| {
            format!("No {ODDS_FILE} in feed directory {}", self.dir.display())
        })?;

        let snapshots: Vec<MatchSnapshot> = decode_each::<WireEvent>(values, "odds event")
            .into_iter()
            .filter(|e| sports.is_empty() || sports.iter().any(|s| s == &e.sport_key))
            .map(WireEvent::into_snapshot)
            .collect();

        info!(
            dir = %self.dir.display(),
            matches = snapshots.len(),
            "Odds snapshot loaded"
        );
        Ok(snapshots)
    }

    async fn fetch_score(&self, target: &MatchRef) -> Result<Option<FinalScore>> {
        let Some(values) = self.read_json::<Vec<Value>>(SCORES_FILE).await? else {
            return Ok(None);
        };
        let events: Vec<WireScoreEvent> = decode_each(values, "score event");
        Ok(find_score(&events, &target.id, &target.home_team, &target.away_team)
            .map(WireScoreEvent::final_score))
    }

    async fn fetch_closing(&self, target: &MatchRef) -> Result<Option<MatchSnapshot>> {
        let Some(file) = self.read_json::<ClosingFile>(CLOSING_FILE).await? else {
            return Ok(None);
        };
        Ok(file
            .into_events()
            .into_iter()
            .find(|e| e.is_match(&target.id, &target.home_team, &target.away_team))
            .map(WireEvent::into_snapshot))
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
