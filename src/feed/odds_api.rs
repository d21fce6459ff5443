//! Live odds API feed.
//!
//! API: `https://api.the-odds-api.com/v4/`
//! Auth: `apiKey` query parameter. Each call costs request credits; the
//! remaining quota is reported in the `x-requests-remaining` header.
//!
//! Endpoints used:
//! - `/sports/{sport}/odds`: current prices
//! - `/sports/{sport}/scores`: recent results (`daysFrom` back)
//! - `/sports/{sport}/odds-history`: prices at a past timestamp
//!
//! A rejected key (401) or an exhausted quota (429, or zero requests
//! remaining) fails the whole call. Any other per-sport failure is skipped
//! unless every sport fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::wire::{decode_each, find_score, WireEvent, WireHistory, WireScoreEvent};
use super::{MatchRef, OddsFeed};
use crate::types::{FinalScore, MarketKind, MatchSnapshot};

/// Sport key the API accepts for "everything starting soon".
const UPCOMING: &str = "upcoming";

/// Failures that make every further request pointless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OddsApiError {
    #[error("odds API rejected the API key")]
    Unauthorized,
    #[error("odds API request quota exhausted")]
    QuotaExceeded,
}

impl OddsApiError {
    fn is_fatal(err: &anyhow::Error) -> bool {
        err.downcast_ref::<OddsApiError>().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsApiConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub regions: String,
    /// How many days of results the scores endpoint looks back.
    pub days_from: u32,
    pub timeout_secs: u64,
}

impl Default for OddsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.the-odds-api.com/v4".to_string(),
            api_key_env: "ODDS_API_KEY".to_string(),
            regions: "uk,eu,us".to_string(),
            days_from: 3,
            timeout_secs: 15,
        }
    }
}

pub struct OddsApiFeed {
    http: Client,
    config: OddsApiConfig,
    api_key: String,
    /// Bookmaker keys requested on every odds call.
    bookmakers: Vec<String>,
}

impl OddsApiFeed {
    pub fn new(config: OddsApiConfig, api_key: String, bookmakers: Vec<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("VALUEBET/0.1.0")
            .build()
            .context("Failed to build HTTP client for the odds API")?;

        Ok(Self {
            http,
            config,
            api_key,
            bookmakers,
        })
    }

    fn markets_param() -> String {
        MarketKind::ALL
            .iter()
            .map(|k| k.feed_key())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn sport_url(&self, sport: &str, endpoint: &str) -> String {
        format!(
            "{}/sports/{}/{endpoint}?apiKey={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(sport),
            urlencoding::encode(&self.api_key),
        )
    }

    pub(crate) fn odds_url(&self, sport: &str) -> String {
        format!(
            "{}&regions={}&markets={}&oddsFormat=decimal&bookmakers={}",
            self.sport_url(sport, "odds"),
            self.config.regions,
            Self::markets_param(),
            self.bookmakers.join(","),
        )
    }

    pub(crate) fn scores_url(&self, sport: &str) -> String {
        format!(
            "{}&daysFrom={}",
            self.sport_url(sport, "scores"),
            self.config.days_from
        )
    }

    pub(crate) fn history_url(&self, target: &MatchRef) -> String {
        let date = target.kickoff.to_rfc3339_opts(SecondsFormat::Secs, true);
        format!(
            "{}&regions={}&markets={}&oddsFormat=decimal&date={}&bookmakers={}",
            self.sport_url(&target.sport_key, "odds-history"),
            self.config.regions,
            Self::markets_param(),
            urlencoding::encode(&date),
            self.bookmakers.join(","),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Odds API {what} request failed"))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => return Err(OddsApiError::Unauthorized.into()),
            StatusCode::TOO_MANY_REQUESTS => return Err(OddsApiError::QuotaExceeded.into()),
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Odds API {what} error {status}: {body}");
            }
            _ => {}
        }

        let remaining = resp
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        if let Some(remaining) = remaining {
            debug!(endpoint = what, remaining, "Odds API quota");
            if remaining <= 0.0 {
                return Err(OddsApiError::QuotaExceeded.into());
            }
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse odds API {what} response"))
    }
}

#[async_trait]
impl OddsFeed for OddsApiFeed {
    /// One request per sport. A failing sport is logged and skipped; a
    /// fatal error, or every sport failing, is returned.
    async fn fetch_odds(&self, sports: &[String]) -> Result<Vec<MatchSnapshot>> {
        let sports: Vec<&str> = if sports.is_empty() {
            vec![UPCOMING]
        } else {
            sports.iter().map(String::as_str).collect()
        };

        let mut snapshots = Vec::new();
        let mut last_error = None;
        let mut fetched = 0;
        for &sport in &sports {
            match self.get_json::<Vec<Value>>(&self.odds_url(sport), "odds").await {
                Ok(values) => {
                    fetched += 1;
                    let events: Vec<WireEvent> = decode_each(values, "odds event");
                    debug!(sport, events = events.len(), "Odds fetched");
                    snapshots.extend(events.into_iter().map(WireEvent::into_snapshot));
                }
                Err(e) if OddsApiError::is_fatal(&e) => return Err(e),
                Err(e) => {
                    warn!(sport, error = %e, "Odds fetch failed, continuing");
                    last_error = Some(e);
                }
            }
        }

        if fetched == 0 {
            if let Some(e) = last_error {
                return Err(e.context(format!(
                    "Odds API unavailable: all {} sport requests failed",
                    sports.len()
                )));
            }
        }

        info!(matches = snapshots.len(), "Odds API scan complete");
        Ok(snapshots)
    }

    async fn fetch_score(&self, target: &MatchRef) -> Result<Option<FinalScore>> {
        let values: Vec<Value> = self
            .get_json(&self.scores_url(&target.sport_key), "scores")
            .await?;
        let events: Vec<WireScoreEvent> = decode_each(values, "score event");
        Ok(find_score(&events, &target.id, &target.home_team, &target.away_team)
            .map(WireScoreEvent::final_score))
    }

    async fn fetch_closing(&self, target: &MatchRef) -> Result<Option<MatchSnapshot>> {
        let history: WireHistory = self
            .get_json(&self.history_url(target), "odds-history")
            .await?;
        Ok(history
            .events()
            .into_iter()
            .find(|e| e.is_match(&target.id, &target.home_team, &target.away_team))
            .map(WireEvent::into_snapshot))
    }

    fn name(&self) -> &str {
        "odds-api"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
