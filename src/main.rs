//! VALUEBET: Sports exchange value finder
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores positions and ledger from disk, runs one command, and saves
//! whatever it changed.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use valuebet::app::App;
use valuebet::config::{AppConfig, FeedSource};
use valuebet::feed::{OddsApiFeed, OddsFeed, SnapshotFeed};
use valuebet::storage;
use valuebet::types::Opportunity;

#[derive(Parser)]
#[command(name = "valuebet", version, about = "Find and track value bets on betting exchanges")]
struct Cli {
    /// Config file (defaults to $VALUEBET_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the feed and list qualifying opportunities
    Scan {
        /// Print opportunities as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track an opportunity from the current scan
    Track {
        opportunity_id: String,
        /// Venue to bet at (defaults to the best offer)
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// List open positions
    Positions,
    /// Settle started positions from final scores
    Settle,
    /// Void a position
    Void { position_id: String },
    /// Delete a position from the book
    Delete { position_id: String },
    /// Record closing lines for started positions
    Close,
    /// Deposit funds at a venue
    Deposit { venue: String, amount: Decimal },
    /// Withdraw funds from a venue
    Withdraw { venue: String, amount: Decimal },
    /// Correct a venue balance by a signed amount
    Adjust {
        venue: String,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        #[arg(long)]
        note: Option<String>,
    },
    /// Performance statistics and venue balances
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(AppConfig::path_from_env);
    let cfg = AppConfig::load(&config_path)?;

    info!(
        config = %config_path,
        reference = %cfg.scanner.reference_venue,
        venues = cfg.venues.len(),
        "VALUEBET starting"
    );

    let positions_path = cfg.storage.positions_path.clone();
    let ledger_path = cfg.storage.ledger_path.clone();
    let book = storage::load_positions(Some(&positions_path))?;
    let ledger = storage::load_ledger(Some(&ledger_path))?;
    let feed = build_feed(&cfg)?;
    let mut app = App::new(cfg, feed, book, ledger);
    let now = Utc::now();

    let mut dirty = true;
    match cli.command {
        Command::Scan { json } => {
            let opportunities = app.scan(now).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&opportunities)?);
            } else {
                print_opportunities(&opportunities);
            }
            dirty = false;
        }
        Command::Track {
            opportunity_id,
            venue,
            note,
        } => {
            let position = app
                .track(&opportunity_id, venue.as_deref(), note, now)
                .await?;
            println!("Tracked {}\n  {position}", position.id);
        }
        Command::Positions => {
            for p in app.book.open_positions() {
                println!("{}  {p}", p.id);
            }
            dirty = false;
        }
        Command::Settle => {
            let report = app.settle_due(now).await?;
            for (id, result) in &report.settled {
                println!("{id}: {result}");
            }
            println!(
                "{} settled, {} awaiting final score, {} failed",
                report.settled.len(),
                report.pending,
                report.failed
            );
        }
        Command::Void { position_id } => {
            app.void(&position_id, now)?;
            println!("Voided {position_id}");
        }
        Command::Delete { position_id } => {
            let position = app.delete(&position_id)?;
            println!("Deleted {}\n  {position}", position.id);
        }
        Command::Close => {
            let report = app.close_due(now).await?;
            for (id, clv) in &report.recorded {
                println!("{id}: CLV {clv:+.2}%");
            }
            println!(
                "{} recorded, {} unavailable, {} failed",
                report.recorded.len(),
                report.unavailable,
                report.failed
            );
        }
        Command::Deposit { venue, amount } => {
            app.deposit(&venue, amount, now)?;
            println!("{venue}: balance {:.2}", app.ledger.balance(&venue));
        }
        Command::Withdraw { venue, amount } => {
            app.withdraw(&venue, amount, now)?;
            println!("{venue}: balance {:.2}", app.ledger.balance(&venue));
        }
        Command::Adjust {
            venue,
            amount,
            note,
        } => {
            app.adjust(&venue, amount, note, now)?;
            println!("{venue}: balance {:.2}", app.ledger.balance(&venue));
        }
        Command::Stats => {
            println!("{}", app.report().render());
            println!("BALANCES:");
            for (venue, balance) in app.ledger.balances() {
                println!("  {venue:<16} {balance:>10.2}");
            }
            println!("  {:<16} {:>10.2}", "total", app.ledger.total());
            dirty = false;
        }
    }

    if dirty {
        storage::save_positions(&app.book, Some(&positions_path))?;
        storage::save_ledger(&app.ledger, Some(&ledger_path))?;
    }

    Ok(())
}

fn build_feed(cfg: &AppConfig) -> Result<Box<dyn OddsFeed>> {
    let feed: Box<dyn OddsFeed> = match cfg.feed.source {
        FeedSource::Snapshot => Box::new(SnapshotFeed::new(&cfg.feed.dir)),
        FeedSource::OddsApi => {
            let api_key = AppConfig::resolve_env(&cfg.feed.odds_api.api_key_env)?;
            Box::new(OddsApiFeed::new(
                cfg.feed.odds_api.clone(),
                api_key,
                cfg.bookmaker_keys(),
            )?)
        }
    };
    Ok(feed)
}

fn print_opportunities(opportunities: &[Opportunity]) {
    if opportunities.is_empty() {
        println!("No opportunities.");
        return;
    }
    for o in opportunities {
        println!("{}  {}", o.id, o.kickoff.format("%a %d %b %H:%M"));
        println!("  {o}");
        for offer in o.offers.iter().skip(1) {
            println!("    also {offer}");
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("valuebet=info"));

    let json_logging = std::env::var("VALUEBET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
