//! End-to-end journal scenarios driven through the `TradingJournal` facade.

use chrono::{DateTime, Local, TimeZone};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use trading_journal::metrics::{self, RiskStatus};
use trading_journal::{
    Direction, FileSlotStore, FixedClock, JournalDraft, MemorySlotStore, Snapshot,
    StatePersistence, TradeDraft, TradingJournal, STATE_SLOT,
};

fn at(day: u32, hour: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 5, day, hour, 30, 0).unwrap()
}

fn memory_journal(clock: &FixedClock) -> TradingJournal<Arc<MemorySlotStore>, &FixedClock> {
    let persistence = StatePersistence::new(Arc::new(MemorySlotStore::new()), STATE_SLOT);
    TradingJournal::with_clock(persistence, clock)
}

fn trade(setup: &str, entry: DateTime<Local>, result: Decimal) -> TradeDraft {
    TradeDraft::new("EURUSD", setup, Direction::Buy, entry, result)
}

#[test]
fn losses_walk_risk_status_from_warning_to_danger() {
    let clock = FixedClock::new(at(6, 12));
    let mut journal = memory_journal(&clock);
    assert_eq!(journal.snapshot().risk_settings.initial_capital, dec!(10000));
    assert_eq!(journal.snapshot().risk_settings.max_daily_risk, dec!(2));

    journal.add_trade(trade("setup-breakout", at(6, 9), dec!(-150)));
    assert_eq!(journal.snapshot().daily_risk_used, dec!(1.5));
    assert_eq!(journal.daily_risk_status(), RiskStatus::Warning);
    assert!(journal.check_risk_limit());

    journal.add_trade(trade("setup-breakout", at(6, 10), dec!(-60)));
    assert_eq!(journal.snapshot().daily_risk_used, dec!(2.1));
    assert_eq!(journal.daily_risk_status(), RiskStatus::Danger);
    assert!(!journal.check_risk_limit());
}

#[test]
fn mixed_day_profit_and_win_rate() {
    let clock = FixedClock::new(at(6, 18));
    let mut journal = memory_journal(&clock);
    journal.add_trade(trade("setup-pullback", at(6, 9), dec!(100)));
    journal.add_trade(trade("setup-pullback", at(6, 15), dec!(-40)));

    let snapshot = journal.snapshot();
    assert_eq!(snapshot.daily_trade_profit, dec!(60));
    assert_eq!(snapshot.daily_risk_used, dec!(0.4));
    assert_eq!(metrics::win_rate(&snapshot.trades), "50.0");
    assert_eq!(metrics::win_rate(&[]), "0.0");
}

#[test]
fn trades_from_other_days_do_not_count_today() {
    let clock = FixedClock::new(at(6, 12));
    let mut journal = memory_journal(&clock);
    journal.add_trade(trade("setup-range", at(5, 11), dec!(-500)));
    assert_eq!(journal.snapshot().daily_trade_profit, Decimal::ZERO);
    assert_eq!(journal.snapshot().daily_risk_used, Decimal::ZERO);
    assert_eq!(journal.daily_risk_status(), RiskStatus::Safe);

    // a backdated trade edited into today starts counting
    let mut moved = journal.snapshot().trades[0].clone();
    moved.entry_time = at(6, 11);
    journal.update_trade(moved);
    assert_eq!(journal.snapshot().daily_risk_used, dec!(5));
}

#[test]
fn deleting_a_setup_keeps_its_trades() {
    let clock = FixedClock::new(at(6, 12));
    let mut journal = memory_journal(&clock);
    let id = journal.add_trade(trade("setup-breakout", at(6, 9), dec!(80)));
    journal.add_trade(trade("setup-reversal", at(6, 10), dec!(-20)));
    let before = journal.snapshot().trade(&id).cloned();

    journal.delete_setup("setup-breakout");

    let snapshot = journal.snapshot();
    assert_eq!(snapshot.trade(&id).cloned(), before);
    assert_eq!(snapshot.setup_label("setup-breakout"), trading_journal::UNKNOWN_SETUP);
    let rows = metrics::setup_performance(&snapshot.trades, &snapshot.setups);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].setup_id, "setup-reversal");
    assert_eq!(rows[0].net, rows[0].profit + rows[0].actual_loss);
    assert_eq!(rows[0].loss, dec!(20));
}

#[test]
fn duplicate_journal_dates_are_accepted_by_default() {
    let clock = FixedClock::new(at(6, 7));
    let mut journal = memory_journal(&clock);
    let draft = JournalDraft {
        date: journal.today(),
        error_review_completed: true,
        daily_comment: "wait for London open".into(),
        previous_day_goal_hit: None,
    };
    let first = journal.add_journal(draft.clone());
    let second = journal.add_journal(draft);

    assert_ne!(first, second);
    assert_eq!(journal.snapshot().journals.len(), 2);
    assert!(journal.has_daily_journal());
}

#[test]
fn midnight_reset_then_new_day() {
    let clock = FixedClock::new(at(6, 23));
    let mut journal = memory_journal(&clock);
    journal.add_trade(trade("setup-breakout", at(6, 22), dec!(-120)));
    assert_eq!(journal.snapshot().daily_risk_used, dec!(1.2));

    clock.set(at(7, 0));
    journal.reset_daily_metrics();
    assert_eq!(journal.snapshot().daily_trade_profit, Decimal::ZERO);
    assert_eq!(journal.snapshot().daily_risk_used, Decimal::ZERO);
    assert_eq!(journal.snapshot().trades.len(), 1);

    journal.add_trade(trade("setup-breakout", at(7, 9), dec!(50)));
    assert_eq!(journal.snapshot().daily_trade_profit, dec!(50));
    assert_eq!(journal.snapshot().daily_risk_used, Decimal::ZERO);
}

#[test]
fn journal_survives_reopen_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12));
    let store = Arc::new(FileSlotStore::new(dir.path()));

    let saved: Snapshot = {
        let mut journal =
            TradingJournal::with_clock(StatePersistence::new(store.clone(), STATE_SLOT), &clock);
        journal.add_trade(
            trade("setup-breakout", at(6, 9), dec!(-35.5))
                .notes("still open")
                .mistake("mistake-early-exit"),
        );
        journal.add_setup("Opening Drive");
        journal.snapshot().clone()
    };

    let reopened = TradingJournal::with_clock(StatePersistence::new(store, STATE_SLOT), &clock);
    assert_eq!(reopened.snapshot(), &saved);
    assert!(reopened.snapshot().trades[0].exit_time.is_none());
    assert_eq!(
        metrics::mistake_breakdown(&reopened.snapshot().trades, &reopened.snapshot().mistake_types)[0].name,
        "Early Exit"
    );
}

#[test]
fn failed_writes_keep_the_in_memory_state() {
    let clock = FixedClock::new(at(6, 12));
    let store = Arc::new(MemorySlotStore::new());
    store.set_reject_writes(true);
    let mut journal =
        TradingJournal::with_clock(StatePersistence::new(store.clone(), STATE_SLOT), &clock);

    journal.add_trade(trade("setup-breakout", at(6, 9), dec!(10)));
    assert_eq!(journal.snapshot().trades.len(), 1);
    assert!(store.get(STATE_SLOT).is_none());
}
