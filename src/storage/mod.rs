//! Persistence layer.
//!
//! Position book and bankroll ledger each live in their own JSON file.
//! A missing file means a fresh start, not an error.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::{Ledger, PositionBook};

/// Default position book path.
pub const DEFAULT_POSITIONS_FILE: &str = "valuebet_positions.json";
/// Default ledger path.
pub const DEFAULT_LEDGER_FILE: &str = "valuebet_ledger.json";

fn save_json<T: Serialize>(value: &T, path: &str, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialise {what}"))?;

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory for {path}"))?;
    }

    std::fs::write(path, &json).with_context(|| format!("Failed to write {what} to {path}"))?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &str, what: &str) -> Result<Option<T>> {
    if !Path::new(path).exists() {
        info!(path, "No saved {what} found, starting fresh");
        return Ok(None);
    }

    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {what} from {path}"))?;
    let value = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {what} from {path}"))?;
    Ok(Some(value))
}

/// Save the position book.
pub fn save_positions(book: &PositionBook, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_POSITIONS_FILE);
    save_json(book, path, "positions")?;
    debug!(path, positions = book.len(), "Positions saved");
    Ok(())
}

/// Load the position book, or an empty one if the file doesn't exist.
pub fn load_positions(path: Option<&str>) -> Result<PositionBook> {
    let path = path.unwrap_or(DEFAULT_POSITIONS_FILE);
    let book: PositionBook = load_json(path, "positions")?.unwrap_or_default();
    debug!(
        path,
        positions = book.len(),
        open = book.open_positions().count(),
        "Positions loaded"
    );
    Ok(book)
}

/// Save the bankroll ledger.
pub fn save_ledger(ledger: &Ledger, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_LEDGER_FILE);
    save_json(ledger, path, "ledger")?;
    debug!(path, transactions = ledger.transactions().len(), total = %ledger.total(), "Ledger saved");
    Ok(())
}

/// Load the bankroll ledger, or an empty one if the file doesn't exist.
pub fn load_ledger(path: Option<&str>) -> Result<Ledger> {
    let path = path.unwrap_or(DEFAULT_LEDGER_FILE);
    let ledger: Ledger = load_json(path, "ledger")?.unwrap_or_default();
    debug!(path, total = %ledger.total(), "Ledger loaded");
    Ok(ledger)
}

/// Delete a state file (for testing or reset). Missing files are fine.
pub fn delete_file(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to delete {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
