// Application facade: the only entry point UI collaborators use

use crate::metrics::{self, DailyGoalStatus, RiskStatus};
use crate::persistence::{SlotStore, StatePersistence};
use crate::reducer::{reduce, Command, ReduceContext};
use crate::types::{DailyJournal, JournalDraft, RiskSettings, Snapshot, Trade, TradeDraft};
use chrono::{DateTime, Local, NaiveDate};
use rust_decimal::Decimal;
use std::cell::Cell;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// Source of "now" for command evaluation
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: DateTime<Local>) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

/// Reasons the strict command variants refuse a command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleViolation {
    #[error("complete today's journal with the error review before logging trades")]
    MissingDailyJournal,
    #[error("daily risk limit reached: {used}% used of {limit}%")]
    RiskLimitExceeded { used: Decimal, limit: Decimal },
    #[error("a journal entry already exists for {0}")]
    DuplicateJournal(NaiveDate),
}

/// Owns the current snapshot; every mutation is reduced, then persisted
pub struct TradingJournal<S: SlotStore, C: Clock = SystemClock> {
    state: Snapshot,
    persistence: StatePersistence<S>,
    clock: C,
}

impl<S: SlotStore> TradingJournal<S, SystemClock> {
    /// Load the snapshot from `persistence` and use the system clock
    pub fn open(persistence: StatePersistence<S>) -> Self {
        Self::with_clock(persistence, SystemClock)
    }
}

impl<S: SlotStore, C: Clock> TradingJournal<S, C> {
    pub fn with_clock(persistence: StatePersistence<S>, clock: C) -> Self {
        let state = persistence.load();
        Self {
            state,
            persistence,
            clock,
        }
    }

    /// Read-only view of the current snapshot
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn persistence(&self) -> &StatePersistence<S> {
        &self.persistence
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Reduce, replace, persist, and record the command in the history log
    pub fn dispatch(&mut self, command: Command) {
        let name = command.name();
        let ctx = ReduceContext::new(self.clock.now());
        self.state = reduce(&self.state, command, &ctx);
        self.persistence.save(&self.state);

        info!(
            "📝 {} | trades={} | daily_pnl={} | risk_used={}%",
            name,
            self.state.trades.len(),
            self.state.daily_trade_profit,
            self.state.daily_risk_used
        );
        crate::log_journal_event(&format!(
            "{} | trades={} | daily_pnl={} | risk_used={}%",
            name,
            self.state.trades.len(),
            self.state.daily_trade_profit,
            self.state.daily_risk_used
        ));
    }

    /// Apply commands from a channel (e.g. the reset scheduler) until it closes
    pub async fn run_commands(&mut self, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.dispatch(command);
        }
    }

    /// Log a trade; returns its new id
    pub fn add_trade(&mut self, draft: TradeDraft) -> String {
        self.dispatch(Command::AddTrade(draft));
        self.last_id(|s| s.trades.last().map(|t| t.id.clone()))
    }

    pub fn update_trade(&mut self, trade: Trade) {
        self.dispatch(Command::UpdateTrade(trade));
    }

    pub fn delete_trade(&mut self, id: &str) {
        self.dispatch(Command::DeleteTrade(id.to_string()));
    }

    /// Record a journal entry; returns its new id
    pub fn add_journal(&mut self, draft: JournalDraft) -> String {
        self.dispatch(Command::AddJournal(draft));
        self.last_id(|s| s.journals.last().map(|j| j.id.clone()))
    }

    pub fn update_journal(&mut self, journal: DailyJournal) {
        self.dispatch(Command::UpdateJournal(journal));
    }

    pub fn delete_journal(&mut self, id: &str) {
        self.dispatch(Command::DeleteJournal(id.to_string()));
    }

    pub fn update_risk_settings(&mut self, settings: RiskSettings) {
        self.dispatch(Command::UpdateRiskSettings(settings));
    }

    pub fn add_setup(&mut self, name: &str) -> String {
        self.dispatch(Command::AddSetup(name.to_string()));
        self.last_id(|s| s.setups.last().map(|x| x.id.clone()))
    }

    pub fn delete_setup(&mut self, id: &str) {
        self.dispatch(Command::DeleteSetup(id.to_string()));
    }

    pub fn add_mistake_type(&mut self, name: &str) -> String {
        self.dispatch(Command::AddMistakeType(name.to_string()));
        self.last_id(|s| s.mistake_types.last().map(|x| x.id.clone()))
    }

    pub fn delete_mistake_type(&mut self, id: &str) {
        self.dispatch(Command::DeleteMistakeType(id.to_string()));
    }

    /// Symbols are stored upper-cased
    pub fn add_asset(&mut self, symbol: &str) -> String {
        self.dispatch(Command::AddAsset(symbol.trim().to_uppercase()));
        self.last_id(|s| s.assets.last().map(|x| x.id.clone()))
    }

    pub fn delete_asset(&mut self, id: &str) {
        self.dispatch(Command::DeleteAsset(id.to_string()));
    }

    pub fn reset_daily_metrics(&mut self) {
        self.dispatch(Command::ResetDailyMetrics);
    }

    fn last_id(&self, pick: impl Fn(&Snapshot) -> Option<String>) -> String {
        pick(&self.state).unwrap_or_default()
    }

    /// True iff today's journal exists with the error review completed
    pub fn has_daily_journal(&self) -> bool {
        let today = self.today();
        self.state
            .journals
            .iter()
            .any(|j| j.date == today && j.error_review_completed)
    }

    pub fn daily_risk_status(&self) -> RiskStatus {
        metrics::risk_status(
            self.state.daily_risk_used,
            self.state.risk_settings.max_daily_risk,
        )
    }

    /// True while today's risk usage is still within budget
    pub fn check_risk_limit(&self) -> bool {
        self.state.daily_risk_used < self.state.risk_settings.max_daily_risk
    }

    pub fn daily_goal_status(&self) -> DailyGoalStatus {
        metrics::daily_goal_status(
            self.state.daily_trade_profit,
            None,
            &self.state.risk_settings,
        )
    }

    /// `add_trade` that enforces the journal gate and the risk budget
    pub fn try_add_trade(&mut self, draft: TradeDraft) -> Result<String, RuleViolation> {
        if !self.has_daily_journal() {
            warn!("🚫 Trade rejected: daily journal missing");
            return Err(RuleViolation::MissingDailyJournal);
        }
        if !self.check_risk_limit() {
            warn!("🚫 Trade rejected: daily risk limit reached");
            return Err(RuleViolation::RiskLimitExceeded {
                used: self.state.daily_risk_used,
                limit: self.state.risk_settings.max_daily_risk,
            });
        }
        Ok(self.add_trade(draft))
    }

    /// `add_journal` that refuses a second entry for the same date
    pub fn try_add_journal(&mut self, draft: JournalDraft) -> Result<String, RuleViolation> {
        if self.state.journal_for(draft.date).is_some() {
            warn!("🚫 Journal rejected: entry for {} exists", draft.date);
            return Err(RuleViolation::DuplicateJournal(draft.date));
        }
        Ok(self.add_journal(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemorySlotStore, STATE_SLOT};
    use crate::types::Direction;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn journal(clock: &FixedClock) -> TradingJournal<Arc<MemorySlotStore>, &FixedClock> {
        let persistence = StatePersistence::new(Arc::new(MemorySlotStore::new()), STATE_SLOT);
        TradingJournal::with_clock(persistence, clock)
    }

    fn draft(result: Decimal) -> TradeDraft {
        TradeDraft::new("EURUSD", "setup-breakout", Direction::Buy, noon(), result)
    }

    fn review(date: NaiveDate, done: bool) -> JournalDraft {
        JournalDraft {
            date,
            error_review_completed: done,
            daily_comment: "plan".into(),
            previous_day_goal_hit: Some(true),
        }
    }

    #[test]
    fn every_command_is_persisted() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        let id = journal.add_trade(draft(dec!(25)));

        let reloaded = journal.persistence().load();
        assert_eq!(&reloaded, journal.snapshot());
        assert_eq!(reloaded.trade(&id).map(|t| t.financial_result), Some(dec!(25)));
    }

    #[test]
    fn has_daily_journal_requires_review_for_today() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        assert!(!journal.has_daily_journal());

        journal.add_journal(review(journal.today(), false));
        assert!(!journal.has_daily_journal());

        let yesterday = journal.today().pred_opt().unwrap();
        journal.add_journal(review(yesterday, true));
        assert!(!journal.has_daily_journal());

        let mut entry = journal.snapshot().journals[0].clone();
        entry.error_review_completed = true;
        journal.update_journal(entry);
        assert!(journal.has_daily_journal());

        clock.set(noon() + chrono::Duration::days(1));
        assert!(!journal.has_daily_journal());
    }

    #[test]
    fn strict_trade_requires_journal_and_budget() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        assert_eq!(
            journal.try_add_trade(draft(dec!(-250))),
            Err(RuleViolation::MissingDailyJournal)
        );
        assert!(journal.snapshot().trades.is_empty());

        journal.add_journal(review(journal.today(), true));
        assert!(journal.try_add_trade(draft(dec!(-250))).is_ok());
        assert!(!journal.check_risk_limit());
        assert_eq!(
            journal.try_add_trade(draft(dec!(10))),
            Err(RuleViolation::RiskLimitExceeded {
                used: dec!(2.5),
                limit: dec!(2)
            })
        );
        // the advisory path still accepts it
        journal.add_trade(draft(dec!(10)));
        assert_eq!(journal.snapshot().trades.len(), 2);
    }

    #[test]
    fn strict_journal_rejects_duplicate_date() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        let today = journal.today();
        assert!(journal.try_add_journal(review(today, true)).is_ok());
        assert_eq!(
            journal.try_add_journal(review(today, true)),
            Err(RuleViolation::DuplicateJournal(today))
        );
        journal.add_journal(review(today, true));
        assert_eq!(journal.snapshot().journals.len(), 2);
    }

    #[test]
    fn goal_status_uses_settings() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        journal.add_trade(draft(dec!(150)));
        let goal = journal.daily_goal_status();
        assert_eq!(goal.target, dec!(200));
        assert_eq!(goal.progress, dec!(75));
        assert_eq!(goal.state, metrics::GoalState::Progressing);
    }

    #[test]
    fn reference_helpers_return_new_ids() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        let asset = journal.add_asset(" nas100 ");
        assert_eq!(journal.snapshot().asset_by_symbol("NAS100").map(|a| a.id.clone()), Some(asset.clone()));
        journal.delete_asset(&asset);
        assert!(journal.snapshot().asset_by_symbol("NAS100").is_none());

        let setup = journal.add_setup("Gap Fill");
        assert_eq!(journal.snapshot().setup_name(&setup), Some("Gap Fill"));
        let mistake = journal.add_mistake_type("Overtrading");
        journal.delete_mistake_type(&mistake);
        assert!(journal.snapshot().mistake_type_name(&mistake).is_none());
    }

    #[tokio::test]
    async fn scheduler_commands_are_applied() {
        let clock = FixedClock::new(noon());
        let mut journal = journal(&clock);
        journal.add_trade(draft(dec!(-100)));
        assert_eq!(journal.snapshot().daily_risk_used, dec!(1));

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(Command::ResetDailyMetrics).unwrap();
        drop(tx);
        journal.run_commands(rx).await;

        assert_eq!(journal.snapshot().daily_risk_used, Decimal::ZERO);
        assert_eq!(journal.daily_risk_status(), RiskStatus::Safe);
        assert_eq!(journal.persistence().load().daily_risk_used, Decimal::ZERO);
    }
}
