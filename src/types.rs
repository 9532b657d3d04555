// Core domain types used throughout the trading journal

use chrono::{DateTime, Local, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fallback label for trades whose setup was deleted
pub const UNKNOWN_SETUP: &str = "Unknown setup";
/// Fallback label for trades whose mistake type was deleted
pub const UNKNOWN_MISTAKE: &str = "Unknown mistake";

/// Side of a logged trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

/// Whether the trade followed or opposed the prevailing trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPosition {
    With,
    Against,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "long" => Ok(Direction::Buy),
            "sell" | "short" => Ok(Direction::Sell),
            other => Err(format!("unknown direction '{}' (expected buy or sell)", other)),
        }
    }
}

impl FromStr for TrendPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "with" => Ok(TrendPosition::With),
            "against" => Ok(TrendPosition::Against),
            other => Err(format!("unknown trend position '{}' (expected with or against)", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// One logged trading decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub asset: String,
    /// Weak reference into `Snapshot::setups`; may dangle after a delete
    pub setup_id: String,
    pub direction: Direction,
    pub trend_position: TrendPosition,
    pub entry_time: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Local>>,
    /// Signed outcome; always equal to `profit_loss_percentage`
    pub financial_result: Decimal,
    /// Legacy twin of `financial_result`, kept for older saved blobs
    #[serde(default)]
    pub profit_loss_percentage: Decimal,
    pub leverage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_mistake: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mistake_type_id: Option<String>,
    #[serde(default)]
    pub is_model_trade: bool,
    pub created_at: DateTime<Local>,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.financial_result > Decimal::ZERO
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_time.date_naive()
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// Caller-supplied payload for a new trade (everything but id/createdAt)
#[derive(Debug, Clone, PartialEq)]
pub struct TradeDraft {
    pub asset: String,
    pub setup_id: String,
    pub direction: Direction,
    pub trend_position: TrendPosition,
    pub entry_time: DateTime<Local>,
    pub exit_time: Option<DateTime<Local>>,
    pub financial_result: Decimal,
    pub profit_loss_percentage: Decimal,
    pub leverage: Decimal,
    pub notes: Option<String>,
    pub is_mistake: bool,
    pub mistake_type_id: Option<String>,
    pub is_model_trade: bool,
}

impl TradeDraft {
    /// Start a draft from the entered result; both result fields receive it.
    pub fn new(
        asset: impl Into<String>,
        setup_id: impl Into<String>,
        direction: Direction,
        entry_time: DateTime<Local>,
        result: Decimal,
    ) -> Self {
        Self {
            asset: asset.into(),
            setup_id: setup_id.into(),
            direction,
            trend_position: TrendPosition::With,
            entry_time,
            exit_time: None,
            financial_result: result,
            profit_loss_percentage: result,
            leverage: Decimal::ONE,
            notes: None,
            is_mistake: false,
            mistake_type_id: None,
            is_model_trade: false,
        }
    }

    pub fn trend_position(mut self, trend_position: TrendPosition) -> Self {
        self.trend_position = trend_position;
        self
    }

    pub fn exit_time(mut self, exit_time: DateTime<Local>) -> Self {
        self.exit_time = Some(exit_time);
        self
    }

    /// Leverage below 1x is raised to 1x
    pub fn leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage.max(Decimal::ONE);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Flag the trade as a mistake of the given type
    pub fn mistake(mut self, mistake_type_id: impl Into<String>) -> Self {
        self.is_mistake = true;
        self.mistake_type_id = Some(mistake_type_id.into());
        self
    }

    pub fn model_trade(mut self, is_model_trade: bool) -> Self {
        self.is_model_trade = is_model_trade;
        self
    }

    pub(crate) fn into_trade(self, id: String, created_at: DateTime<Local>) -> Trade {
        Trade {
            id,
            asset: self.asset,
            setup_id: self.setup_id,
            direction: self.direction,
            trend_position: self.trend_position,
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            financial_result: self.financial_result,
            profit_loss_percentage: self.profit_loss_percentage,
            leverage: self.leverage.max(Decimal::ONE),
            notes: self.notes,
            is_mistake: self.is_mistake,
            mistake_type_id: if self.is_mistake { self.mistake_type_id } else { None },
            is_model_trade: self.is_model_trade,
            created_at,
        }
    }
}

/// One journal entry per calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyJournal {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub error_review_completed: bool,
    #[serde(default)]
    pub daily_comment: String,
    /// `None` when there was no previous trading day to judge
    #[serde(default)]
    pub previous_day_goal_hit: Option<bool>,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalDraft {
    pub date: NaiveDate,
    pub error_review_completed: bool,
    pub daily_comment: String,
    pub previous_day_goal_hit: Option<bool>,
}

impl JournalDraft {
    pub(crate) fn into_journal(self, id: String, created_at: DateTime<Local>) -> DailyJournal {
        DailyJournal {
            id,
            date: self.date,
            error_review_completed: self.error_review_completed,
            daily_comment: self.daily_comment,
            previous_day_goal_hit: self.previous_day_goal_hit,
            created_at,
        }
    }
}

/// Risk parameters; a single record, replaced wholesale on update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSettings {
    pub initial_capital: Decimal,
    /// Percent of capital
    pub daily_profit_target: Decimal,
    /// Percent of capital, at most 100
    pub max_daily_risk: Decimal,
    /// Absolute currency ceiling, carried verbatim
    pub daily_risk_limit: Decimal,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            daily_profit_target: dec!(2),
            max_daily_risk: dec!(2),
            daily_risk_limit: dec!(200),
        }
    }
}

impl RiskSettings {
    /// Settings derived from capital and percentages, with the currency limit filled in
    pub fn new(initial_capital: Decimal, daily_profit_target: Decimal, max_daily_risk: Decimal) -> Self {
        Self {
            initial_capital,
            daily_profit_target,
            max_daily_risk,
            daily_risk_limit: share_of(initial_capital, max_daily_risk),
        }
    }

    /// Daily profit target in currency units
    pub fn daily_profit_amount(&self) -> Decimal {
        share_of(self.initial_capital, self.daily_profit_target)
    }
}

/// `amount * percent / 100`, saturating instead of overflowing
fn share_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount
        .checked_mul(percent)
        .map(|v| v / dec!(100))
        .unwrap_or_else(|| {
            if amount.is_sign_negative() != percent.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            }
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupType {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeType {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetType {
    pub id: String,
    pub symbol: String,
}

/// The complete application state at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub trades: Vec<Trade>,
    pub journals: Vec<DailyJournal>,
    pub risk_settings: RiskSettings,
    pub setups: Vec<SetupType>,
    pub mistake_types: Vec<MistakeType>,
    pub assets: Vec<AssetType>,
    /// Cached: sum of today's results
    pub daily_trade_profit: Decimal,
    /// Cached: today's losses as a percent of capital
    pub daily_risk_used: Decimal,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::with_settings(RiskSettings::default())
    }
}

fn starter<T>(items: &[(&str, &str)], build: impl Fn(String, String) -> T) -> Vec<T> {
    items
        .iter()
        .map(|(id, label)| build(id.to_string(), label.to_string()))
        .collect()
}

impl Snapshot {
    /// Empty journal with the starter reference lists and the given settings
    pub fn with_settings(risk_settings: RiskSettings) -> Self {
        Self {
            trades: Vec::new(),
            journals: Vec::new(),
            risk_settings,
            setups: starter(
                &[
                    ("setup-breakout", "Breakout"),
                    ("setup-pullback", "Pullback"),
                    ("setup-reversal", "Reversal"),
                    ("setup-range", "Range"),
                ],
                |id, name| SetupType { id, name },
            ),
            mistake_types: starter(
                &[
                    ("mistake-fomo", "FOMO"),
                    ("mistake-early-exit", "Early Exit"),
                    ("mistake-late-entry", "Late Entry"),
                    ("mistake-oversized", "Oversized Position"),
                    ("mistake-no-stop", "No Stop Loss"),
                ],
                |id, name| MistakeType { id, name },
            ),
            assets: starter(
                &[
                    ("asset-eurusd", "EURUSD"),
                    ("asset-gbpusd", "GBPUSD"),
                    ("asset-xauusd", "XAUUSD"),
                    ("asset-btcusd", "BTCUSD"),
                    ("asset-us30", "US30"),
                ],
                |id, symbol| AssetType { id, symbol },
            ),
            daily_trade_profit: Decimal::ZERO,
            daily_risk_used: Decimal::ZERO,
        }
    }

    pub fn trade(&self, id: &str) -> Option<&Trade> {
        self.trades.iter().find(|t| t.id == id)
    }

    pub fn setup_name(&self, id: &str) -> Option<&str> {
        self.setups.iter().find(|s| s.id == id).map(|s| s.name.as_str())
    }

    pub fn mistake_type_name(&self, id: &str) -> Option<&str> {
        self.mistake_types
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.name.as_str())
    }

    /// Setup label for display, tolerating deleted setups
    pub fn setup_label(&self, id: &str) -> &str {
        self.setup_name(id).unwrap_or(UNKNOWN_SETUP)
    }

    /// Resolve a setup by id or (case-insensitive) name
    pub fn find_setup(&self, key: &str) -> Option<&SetupType> {
        self.setups
            .iter()
            .find(|s| s.id == key || s.name.eq_ignore_ascii_case(key))
    }

    pub fn find_mistake_type(&self, key: &str) -> Option<&MistakeType> {
        self.mistake_types
            .iter()
            .find(|m| m.id == key || m.name.eq_ignore_ascii_case(key))
    }

    pub fn asset_by_symbol(&self, symbol: &str) -> Option<&AssetType> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    /// First journal entry for the given day, if any
    pub fn journal_for(&self, date: NaiveDate) -> Option<&DailyJournal> {
        self.journals.iter().find(|j| j.date == date)
    }
}
