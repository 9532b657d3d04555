// State reducer: every command turns one snapshot into the next

use crate::metrics::{daily_risk_used, daily_trade_profit};
use crate::types::{
    AssetType, DailyJournal, JournalDraft, MistakeType, RiskSettings, SetupType, Snapshot, Trade,
    TradeDraft,
};
use chrono::{DateTime, Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

/// A named state-transition request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddTrade(TradeDraft),
    UpdateTrade(Trade),
    DeleteTrade(String),
    AddJournal(JournalDraft),
    UpdateJournal(DailyJournal),
    DeleteJournal(String),
    UpdateRiskSettings(RiskSettings),
    AddSetup(String),
    DeleteSetup(String),
    AddMistakeType(String),
    DeleteMistakeType(String),
    /// Symbol, stored as given
    AddAsset(String),
    DeleteAsset(String),
    ResetDailyMetrics,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddTrade(_) => "ADD_TRADE",
            Command::UpdateTrade(_) => "UPDATE_TRADE",
            Command::DeleteTrade(_) => "DELETE_TRADE",
            Command::AddJournal(_) => "ADD_JOURNAL",
            Command::UpdateJournal(_) => "UPDATE_JOURNAL",
            Command::DeleteJournal(_) => "DELETE_JOURNAL",
            Command::UpdateRiskSettings(_) => "UPDATE_RISK_SETTINGS",
            Command::AddSetup(_) => "ADD_SETUP",
            Command::DeleteSetup(_) => "DELETE_SETUP",
            Command::AddMistakeType(_) => "ADD_MISTAKE_TYPE",
            Command::DeleteMistakeType(_) => "DELETE_MISTAKE_TYPE",
            Command::AddAsset(_) => "ADD_ASSET",
            Command::DeleteAsset(_) => "DELETE_ASSET",
            Command::ResetDailyMetrics => "RESET_DAILY_METRICS",
        }
    }

    fn touches_trades(&self) -> bool {
        matches!(
            self,
            Command::AddTrade(_) | Command::UpdateTrade(_) | Command::DeleteTrade(_)
        )
    }
}

/// Evaluation-time inputs of a transition
#[derive(Debug, Clone, Copy)]
pub struct ReduceContext {
    pub now: DateTime<Local>,
}

impl ReduceContext {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Replace the element with a matching id; no-op when absent.
/// `keep` copies the fields the stored element owns (its creation time)
/// onto the replacement first.
fn replace_by_id<T>(
    items: &mut [T],
    mut replacement: T,
    id_of: impl Fn(&T) -> &str,
    keep: impl Fn(&T, &mut T),
) {
    let id = id_of(&replacement).to_string();
    if let Some(slot) = items.iter_mut().find(|item| id_of(item) == id) {
        keep(slot, &mut replacement);
        *slot = replacement;
    }
}

/// Recompute the cached daily counters from the trade list
pub fn recompute_daily(snapshot: &mut Snapshot, today: NaiveDate) {
    snapshot.daily_trade_profit = daily_trade_profit(&snapshot.trades, today);
    snapshot.daily_risk_used = daily_risk_used(
        &snapshot.trades,
        today,
        snapshot.risk_settings.initial_capital,
    );
    debug!(
        "daily counters recomputed for {}: pnl={} risk_used={}%",
        today, snapshot.daily_trade_profit, snapshot.daily_risk_used
    );
}

/// Apply `command` to `state`, returning the next snapshot.
///
/// Business rules (one journal per day, risk budget, journal-before-trade)
/// are not checked here; callers consult the facade's queries first.
/// Deleting a setup, mistake type or asset leaves referencing trades as they are.
pub fn reduce(state: &Snapshot, command: Command, ctx: &ReduceContext) -> Snapshot {
    let mut next = state.clone();
    let recompute = command.touches_trades();

    match command {
        Command::AddTrade(draft) => {
            next.trades.push(draft.into_trade(new_id(), ctx.now));
        }
        Command::UpdateTrade(trade) => {
            replace_by_id(&mut next.trades, trade, |t| t.id.as_str(), |old, new| {
                new.created_at = old.created_at;
            });
        }
        Command::DeleteTrade(id) => {
            next.trades.retain(|t| t.id != id);
        }
        Command::AddJournal(draft) => {
            next.journals.push(draft.into_journal(new_id(), ctx.now));
        }
        Command::UpdateJournal(journal) => {
            replace_by_id(&mut next.journals, journal, |j| j.id.as_str(), |old, new| {
                new.created_at = old.created_at;
            });
        }
        Command::DeleteJournal(id) => {
            next.journals.retain(|j| j.id != id);
        }
        Command::UpdateRiskSettings(settings) => {
            next.risk_settings = settings;
        }
        Command::AddSetup(name) => {
            next.setups.push(SetupType { id: new_id(), name });
        }
        Command::DeleteSetup(id) => {
            next.setups.retain(|s| s.id != id);
        }
        Command::AddMistakeType(name) => {
            next.mistake_types.push(MistakeType { id: new_id(), name });
        }
        Command::DeleteMistakeType(id) => {
            next.mistake_types.retain(|m| m.id != id);
        }
        Command::AddAsset(symbol) => {
            next.assets.push(AssetType { id: new_id(), symbol });
        }
        Command::DeleteAsset(id) => {
            next.assets.retain(|a| a.id != id);
        }
        Command::ResetDailyMetrics => {
            next.daily_trade_profit = Decimal::ZERO;
            next.daily_risk_used = Decimal::ZERO;
        }
    }

    if recompute {
        recompute_daily(&mut next, ctx.today());
    }
    next
}
