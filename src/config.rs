//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` into strongly-typed sections. Every field has a
//! default, so a partial (or empty) file is valid. The odds API key is
//! referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::engine::scanner::{EdgeScanner, ScannerConfig, MAX_HORIZON_HOURS};
use crate::feed::OddsApiConfig;
use crate::strategy::edge::EdgeConfig;
use crate::strategy::kelly::{KellyCalculator, KellyConfig};
use crate::storage::{DEFAULT_LEDGER_FILE, DEFAULT_POSITIONS_FILE};
use crate::types::Venue;

/// Environment variable overriding the config file path.
pub const CONFIG_ENV: &str = "VALUEBET_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerSection,
    pub sizing: SizingSection,
    pub venues: Vec<VenueConfig>,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    pub reference_venue: String,
    pub min_net_edge_pct: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub horizon_hours: i64,
}

impl Default for ScannerSection {
    fn default() -> Self {
        let scanner = ScannerConfig::default();
        let edge = EdgeConfig::default();
        Self {
            reference_venue: scanner.reference_venue,
            min_net_edge_pct: edge.min_net_edge_pct,
            min_price: edge.min_price,
            max_price: edge.max_price,
            horizon_hours: scanner.horizon_hours,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingSection {
    pub kelly_multiplier: f64,
    pub flat_stake: f64,
}

impl Default for SizingSection {
    fn default() -> Self {
        let kelly = KellyConfig::default();
        Self {
            kelly_multiplier: kelly.multiplier,
            flat_stake: kelly.flat_stake,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    pub key: String,
    pub name: String,
    /// Fraction of net winnings taken, e.g. 0.02.
    pub commission: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedSource {
    #[default]
    Snapshot,
    OddsApi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: FeedSource,
    /// Directory read by the snapshot feed.
    pub dir: String,
    /// Sport keys to scan; empty means everything the feed has.
    pub sports: Vec<String>,
    pub odds_api: OddsApiConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::Snapshot,
            dir: "feed".to_string(),
            sports: vec!["soccer_epl".to_string()],
            odds_api: OddsApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub positions_path: String,
    pub ledger_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            positions_path: DEFAULT_POSITIONS_FILE.to_string(),
            ledger_path: DEFAULT_LEDGER_FILE.to_string(),
        }
    }
}

fn default_venues() -> Vec<VenueConfig> {
    [
        ("smarkets", "Smarkets", 0.02),
        ("betfair_ex_uk", "Betfair", 0.05),
        ("matchbook", "Matchbook", 0.015),
    ]
    .into_iter()
    .map(|(key, name, commission)| VenueConfig {
        key: key.to_string(),
        name: name.to_string(),
        commission,
    })
    .collect()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration text. An empty `[[venues]]` list falls back to
    /// the three default exchanges.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;
        if config.venues.is_empty() {
            config.venues = default_venues();
        }
        config.validate()?;
        Ok(config)
    }

    /// Path from `VALUEBET_CONFIG`, else `config.toml`.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
    }

    /// Resolve an environment variable name to its value.
    /// Used for the odds API key referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    fn validate(&self) -> Result<()> {
        let s = &self.scanner;
        anyhow::ensure!(
            s.min_price <= s.max_price,
            "scanner.min_price ({}) exceeds scanner.max_price ({})",
            s.min_price,
            s.max_price
        );
        anyhow::ensure!(
            (1..=MAX_HORIZON_HOURS).contains(&s.horizon_hours),
            "scanner.horizon_hours ({}) must be between 1 and {MAX_HORIZON_HOURS}",
            s.horizon_hours
        );
        anyhow::ensure!(
            self.sizing.kelly_multiplier >= 0.0,
            "sizing.kelly_multiplier must not be negative"
        );
        for v in &self.venues {
            anyhow::ensure!(
                (0.0..1.0).contains(&v.commission),
                "venue {} commission {} must be in [0, 1)",
                v.key,
                v.commission
            );
        }
        Ok(())
    }

    pub fn venues(&self) -> Vec<Venue> {
        self.venues
            .iter()
            .map(|v| Venue::new(v.key.clone(), v.name.clone(), v.commission))
            .collect()
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            reference_venue: self.scanner.reference_venue.clone(),
            horizon_hours: self.scanner.horizon_hours,
        }
    }

    pub fn edge_config(&self) -> EdgeConfig {
        EdgeConfig {
            min_net_edge_pct: self.scanner.min_net_edge_pct,
            min_price: self.scanner.min_price,
            max_price: self.scanner.max_price,
        }
    }

    pub fn kelly_config(&self) -> KellyConfig {
        KellyConfig {
            multiplier: self.sizing.kelly_multiplier,
            flat_stake: self.sizing.flat_stake,
        }
    }

    pub fn scanner(&self) -> EdgeScanner {
        EdgeScanner::new(self.scanner_config(), self.edge_config(), self.venues())
    }

    pub fn sizing(&self) -> KellyCalculator {
        KellyCalculator::new(self.kelly_config())
    }

    /// Bookmaker keys a live feed must request: the reference venue plus
    /// every tradable venue.
    pub fn bookmaker_keys(&self) -> Vec<String> {
        let mut keys = vec![self.scanner.reference_venue.clone()];
        for v in &self.venues {
            if !keys.contains(&v.key) {
                keys.push(v.key.clone());
            }
        }
        keys
    }
}
