//! End-to-end runs of the application session against the mock feed:
//! scan, track, settle, record closing lines, and report.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use valuebet::app::App;
use valuebet::config::AppConfig;
use valuebet::engine::{Ledger, PositionBook, TransactionKind};
use valuebet::storage;
use valuebet::types::*;

use crate::mock_feed::{h2h, make_match, quote, totals, MockFeed};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Three matches: a match-result edge at Smarkets and Betfair, a totals
/// edge at Matchbook, and one outside the scan horizon.
fn make_feed() -> MockFeed {
    MockFeed::with_odds(vec![
        make_match(
            "m1",
            now() + Duration::hours(6),
            vec![
                quote("pinnacle", vec![h2h(2.00, 3.60, 4.00)]),
                quote("smarkets", vec![h2h(2.30, 3.50, 3.90)]),
                quote("betfair_ex_uk", vec![h2h(2.20, 3.55, 3.95)]),
            ],
        ),
        make_match(
            "m2",
            now() + Duration::hours(30),
            vec![
                quote("pinnacle", vec![totals(1.95, 1.95, 2.5)]),
                quote("matchbook", vec![totals(2.10, 1.80, 2.5)]),
            ],
        ),
        make_match(
            "m3",
            now() + Duration::hours(72),
            vec![
                quote("pinnacle", vec![h2h(2.00, 3.60, 4.00)]),
                quote("smarkets", vec![h2h(2.60, 3.50, 3.90)]),
            ],
        ),
    ])
}

fn make_app(feed: &MockFeed) -> App {
    let config = AppConfig::from_toml("").unwrap();
    App::new(
        config,
        Box::new(feed.clone()),
        PositionBook::new(),
        Ledger::new(),
    )
}

async fn track_id(app: &mut App, opportunity_id: &str) -> String {
    app.track(opportunity_id, None, None, now())
        .await
        .unwrap()
        .id
        .clone()
}

fn funded_app(feed: &MockFeed) -> App {
    let mut app = make_app(feed);
    app.deposit("smarkets", dec!(500), now()).unwrap();
    app.deposit("matchbook", dec!(500), now()).unwrap();
    app
}

#[tokio::test]
async fn test_scan_finds_opportunities_inside_horizon() {
    let feed = make_feed();
    let app = make_app(&feed);

    let opportunities = app.scan(now()).await.unwrap();

    assert_eq!(opportunities.len(), 2);
    assert_eq!(opportunities[0].id, "m1-h2h-Arsenal");
    assert_eq!(opportunities[0].venue_key, "smarkets");
    assert_eq!(opportunities[0].offers.len(), 2);
    assert!(opportunities[1].id.starts_with("m2-totals-Over"));
    assert_eq!(opportunities[1].venue_key, "matchbook");
    assert!(opportunities.iter().all(|o| o.match_id != "m3"));
}

#[tokio::test]
async fn test_scan_propagates_feed_error() {
    let feed = make_feed();
    feed.set_error("feed offline");
    let app = make_app(&feed);

    let err = app.scan(now()).await.unwrap_err();
    assert!(format!("{err:#}").contains("feed offline"));
}

#[tokio::test]
async fn test_track_sizes_against_ledger_bankroll() {
    let feed = make_feed();
    let mut app = funded_app(&feed);

    let position = app
        .track("m1-h2h-Arsenal", None, Some("early".into()), now())
        .await
        .unwrap()
        .clone();

    assert_eq!(position.venue_key, "smarkets");
    assert_eq!(position.flat_stake, 1.0);
    let expected = 1000.0 * position.opportunity.kelly_pct / 100.0 * 0.30;
    assert!((position.kelly_stake - expected).abs() < 1e-9);
    assert_eq!(position.timing_bucket, TimingBucket::from_hours(6.0));
    assert_eq!(app.book.len(), 1);
}

#[tokio::test]
async fn test_track_at_named_venue() {
    let feed = make_feed();
    let mut app = funded_app(&feed);

    let position = app
        .track("m1-h2h-Arsenal", Some("betfair_ex_uk"), None, now())
        .await
        .unwrap();

    assert_eq!(position.venue_key, "betfair_ex_uk");
    assert_eq!(position.price, 2.20);
}

#[tokio::test]
async fn test_track_rejects_unknown_ids_and_venues() {
    let feed = make_feed();
    let mut app = funded_app(&feed);

    assert!(app.track("m9-h2h-Nobody", None, None, now()).await.is_err());
    assert!(app
        .track("m1-h2h-Arsenal", Some("matchbook"), None, now())
        .await
        .is_err());
    assert!(app.book.is_empty());
}

#[tokio::test]
async fn test_full_lifecycle_books_profit_and_clv() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;
    app.track("m2-totals-Over 2.5", None, None, now())
        .await
        .unwrap();

    // Before kickoff nothing is due.
    let report = app.settle_due(now()).await.unwrap();
    assert!(report.settled.is_empty());
    assert_eq!(report.pending, 0);

    // After m1 kicks off but before the result is in.
    let later = now() + Duration::hours(8);
    let report = app.settle_due(later).await.unwrap();
    assert!(report.settled.is_empty());
    assert_eq!(report.pending, 1);

    feed.set_score("m1", FinalScore::full_time(2, 1));
    let report = app.settle_due(later).await.unwrap();
    assert_eq!(report.settled, vec![(id.clone(), BetResult::Won)]);

    let position = app.book.positions()[0].clone();
    let settlement = position.settlement().unwrap();
    let expected_pl = position.kelly_stake * 1.30 * 0.98;
    assert!((settlement.kelly_pl - expected_pl).abs() < 1e-9);
    assert!((settlement.flat_pl - 1.30 * 0.98).abs() < 1e-9);

    // The win is booked once against the venue it was placed at.
    let booked = Decimal::from_f64(settlement.kelly_pl).unwrap().round_dp(2);
    assert_eq!(app.ledger.balance("smarkets"), dec!(500) + booked);
    assert_eq!(app.ledger.balance("matchbook"), dec!(500));
    assert!(app.ledger.has_position(&position.id));
    let bets: Vec<_> = app
        .ledger
        .transactions()
        .iter()
        .filter(|t| t.kind.is_bet())
        .collect();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].kind, TransactionKind::BetWin);

    // A second sweep does not touch the settled position.
    let report = app.settle_due(later).await.unwrap();
    assert!(report.settled.is_empty());
    assert_eq!(app.ledger.transactions().len(), 3);

    // Closing line: the reference shortened on Arsenal.
    feed.set_closing(make_match(
        "m1",
        now() + Duration::hours(6),
        vec![quote("pinnacle", vec![h2h(1.95, 3.80, 4.20)])],
    ));
    let report = app.close_due(later).await.unwrap();
    assert_eq!(report.recorded.len(), 1);
    let (recorded_id, clv) = &report.recorded[0];
    assert_eq!(recorded_id, &id);
    assert!(*clv > 15.0 && *clv < 17.0);

    let closing = app.book.get(&id).unwrap().closing().unwrap();
    assert!(closing.beat_close());

    // Already recorded: nothing left to close.
    let report = app.close_due(later).await.unwrap();
    assert!(report.recorded.is_empty());
    assert_eq!(report.unavailable, 0);

    let stats = app.report();
    assert_eq!(stats.summary.total, 2);
    assert_eq!(stats.summary.settled, 1);
    assert_eq!(stats.summary.wins, 1);
    assert_eq!(stats.summary.with_clv, 1);
    assert_eq!(stats.by_sport.len(), 1);
    assert_eq!(stats.by_sport[0].count, 2);
}

#[tokio::test]
async fn test_unavailable_closing_line_stays_pending() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;

    let later = now() + Duration::hours(8);
    let report = app.close_due(later).await.unwrap();
    assert_eq!(report.unavailable, 1);

    // Closing snapshot without the reference venue.
    feed.set_closing(make_match(
        "m1",
        now() + Duration::hours(6),
        vec![quote("smarkets", vec![h2h(2.10, 3.50, 3.90)])],
    ));
    let report = app.close_due(later).await.unwrap();
    assert_eq!(report.unavailable, 1);
    assert!(app.book.get(&id).unwrap().closing().is_none());
}

#[tokio::test]
async fn test_feed_errors_leave_positions_open() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;

    feed.set_score("m1", FinalScore::full_time(0, 0));
    feed.set_error("rate limited");
    let later = now() + Duration::hours(8);

    let report = app.settle_due(later).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(app.book.positions()[0].is_open());

    let report = app.close_due(later).await.unwrap();
    assert_eq!(report.failed, 1);

    feed.clear_error();
    let report = app.settle_due(later).await.unwrap();
    assert_eq!(report.settled, vec![(id.clone(), BetResult::Lost)]);
    let position = &app.book.positions()[0];
    let stake = Decimal::from_f64(position.kelly_stake).unwrap().round_dp(2);
    assert_eq!(app.ledger.balance("smarkets"), dec!(500) - stake);
}

#[tokio::test]
async fn test_incomplete_score_counts_as_pending() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;

    feed.set_score("m1", FinalScore::pending());
    let report = app
        .settle_due(now() + Duration::hours(7))
        .await
        .unwrap();

    assert!(report.settled.is_empty());
    assert_eq!(report.pending, 1);
    assert!(app.ledger.transactions().iter().all(|t| !t.kind.is_bet()));
}

#[tokio::test]
async fn test_void_books_zero_and_blocks_settlement() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;

    app.void(&id, now()).unwrap();
    assert_eq!(app.ledger.balance("smarkets"), dec!(500));
    let last = app.ledger.transactions().last().unwrap();
    assert_eq!(last.kind, TransactionKind::BetVoid);
    assert_eq!(last.amount, Decimal::ZERO);

    feed.set_score("m1", FinalScore::full_time(3, 0));
    let report = app
        .settle_due(now() + Duration::hours(8))
        .await
        .unwrap();
    assert!(report.settled.is_empty());
    assert!(app.void(&id, now()).is_err());
}

#[tokio::test]
async fn test_deposit_and_withdraw_require_configured_venue() {
    let feed = make_feed();
    let mut app = make_app(&feed);

    assert!(app.deposit("pinnacle", dec!(100), now()).is_err());
    app.deposit("betfair_ex_uk", dec!(100), now()).unwrap();
    app.withdraw("betfair_ex_uk", dec!(40), now()).unwrap();
    assert!(app.withdraw("unknown", dec!(1), now()).is_err());

    assert_eq!(app.ledger.balance("betfair_ex_uk"), dec!(60));
    assert_eq!(app.ledger.total(), dec!(60));
}

#[tokio::test]
async fn test_session_state_survives_reload() {
    let dir = std::env::temp_dir().join(format!("valuebet-workflow-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let positions_path = dir.join("positions.json").to_string_lossy().to_string();
    let ledger_path = dir.join("ledger.json").to_string_lossy().to_string();

    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;
    storage::save_positions(&app.book, Some(&positions_path)).unwrap();
    storage::save_ledger(&app.ledger, Some(&ledger_path)).unwrap();

    let book = storage::load_positions(Some(&positions_path)).unwrap();
    let ledger = storage::load_ledger(Some(&ledger_path)).unwrap();
    let config = AppConfig::from_toml("").unwrap();
    let mut reloaded = App::new(config, Box::new(feed.clone()), book, ledger);

    assert_eq!(reloaded.book.len(), 1);
    assert_eq!(reloaded.ledger.total(), dec!(1000));

    feed.set_score("m1", FinalScore::full_time(1, 1));
    let report = reloaded
        .settle_due(now() + Duration::hours(8))
        .await
        .unwrap();
    assert_eq!(report.settled, vec![(id.clone(), BetResult::Lost)]);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_ledger_failure_does_not_stop_settlement_sweep() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let first = track_id(&mut app, "m1-h2h-Arsenal").await;
    let second = track_id(&mut app, "m2-totals-Over 2.5").await;
    let later = now() + Duration::hours(31);

    // A ledger that already carries a booking for the first position.
    let mut settled_elsewhere = app.book.clone();
    settled_elsewhere
        .settle(&first, &FinalScore::full_time(2, 1), later)
        .unwrap();
    app.ledger
        .record_settlement(settled_elsewhere.get(&first).unwrap(), later)
        .unwrap();

    feed.set_score("m1", FinalScore::full_time(2, 1));
    feed.set_score("m2", FinalScore::full_time(3, 1));
    let report = app.settle_due(later).await.unwrap();

    assert_eq!(
        report.settled,
        vec![(first.clone(), BetResult::Won), (second.clone(), BetResult::Won)]
    );
    assert_eq!(report.failed, 1);
    assert!(app.ledger.has_position(&second));
    let bookings = app
        .ledger
        .transactions()
        .iter()
        .filter(|t| t.position_id.as_deref() == Some(first.as_str()))
        .count();
    assert_eq!(bookings, 1);
}

#[tokio::test]
async fn test_delete_position() {
    let feed = make_feed();
    let mut app = funded_app(&feed);
    let id = track_id(&mut app, "m1-h2h-Arsenal").await;
    let other = track_id(&mut app, "m2-totals-Over 2.5").await;

    let removed = app.delete(&id).unwrap();
    assert_eq!(removed.id, id);
    assert_eq!(app.book.len(), 1);
    assert!(app.book.get(&id).is_none());
    assert!(app.book.get(&other).is_some());
    assert!(app.delete(&id).is_err());

    // Nothing left to settle for the deleted match.
    feed.set_score("m1", FinalScore::full_time(1, 0));
    let report = app
        .settle_due(now() + Duration::hours(8))
        .await
        .unwrap();
    assert!(report.settled.is_empty());
    assert_eq!(app.ledger.total(), dec!(1000));
}

#[tokio::test]
async fn test_adjust_venue_balance() {
    let feed = make_feed();
    let mut app = funded_app(&feed);

    app.adjust("smarkets", dec!(-12.50), Some("fee".into()), now())
        .unwrap();
    app.adjust("matchbook", dec!(3), None, now()).unwrap();
    assert!(app.adjust("smarkets", Decimal::ZERO, None, now()).is_err());
    assert!(app.adjust("pinnacle", dec!(5), None, now()).is_err());

    assert_eq!(app.ledger.balance("smarkets"), dec!(487.50));
    assert_eq!(app.ledger.balance("matchbook"), dec!(503));
    let last = app.ledger.transactions().last().unwrap();
    assert_eq!(last.kind, TransactionKind::Adjustment);
}
