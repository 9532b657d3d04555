// Derived metrics over trades and settings (pure, stateless queries)

use crate::types::{MistakeType, RiskSettings, SetupType, Trade, UNKNOWN_MISTAKE};
use chrono::{NaiveDate, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

fn saturating_sum(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

/// `part / whole * 100`, saturating at the Decimal bounds instead of panicking
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or_else(|| {
            if part.is_sign_negative() != whole.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            }
        })
}

/// Sum of today's results
pub fn daily_trade_profit(trades: &[Trade], today: NaiveDate) -> Decimal {
    saturating_sum(
        trades
            .iter()
            .filter(|t| t.entry_date() == today)
            .map(|t| t.financial_result),
    )
}

/// Today's losses as a percentage of capital; 0 when capital is not positive
pub fn daily_risk_used(trades: &[Trade], today: NaiveDate, initial_capital: Decimal) -> Decimal {
    if initial_capital <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let losses = saturating_sum(
        trades
            .iter()
            .filter(|t| t.entry_date() == today && t.financial_result < Decimal::ZERO)
            .map(|t| t.financial_result.abs()),
    );
    percent_of(losses, initial_capital)
}

/// Trades entered between `from` and `to`, both inclusive
pub fn trades_between(trades: &[Trade], from: NaiveDate, to: NaiveDate) -> Vec<Trade> {
    trades
        .iter()
        .filter(|t| {
            let day = t.entry_date();
            day >= from && day <= to
        })
        .cloned()
        .collect()
}

pub fn total_profit_loss(trades: &[Trade]) -> Decimal {
    saturating_sum(trades.iter().map(|t| t.financial_result))
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Share of winning trades, formatted to one decimal ("0.0" when empty)
pub fn win_rate(trades: &[Trade]) -> String {
    let wins = trades.iter().filter(|t| t.is_win()).count();
    format!("{:.1}", percentage(wins, trades.len()))
}

pub fn mistake_count(trades: &[Trade]) -> usize {
    trades.iter().filter(|t| t.is_mistake).count()
}

pub fn model_trade_count(trades: &[Trade]) -> usize {
    trades.iter().filter(|t| t.is_model_trade).count()
}

pub fn average_leverage(trades: &[Trade]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let total = saturating_sum(trades.iter().map(|t| t.leverage));
    total / Decimal::from(trades.len())
}

/// Aggregate performance of one setup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupPerformance {
    pub setup_id: String,
    pub name: String,
    /// Sum of winning results
    pub profit: Decimal,
    /// Magnitude of losing results, for display
    pub loss: Decimal,
    /// Signed sum of losing results (`-loss`)
    pub actual_loss: Decimal,
    /// `profit + actual_loss`
    pub net: Decimal,
    pub wins: usize,
    pub losses: usize,
    pub total_trades: usize,
    pub win_rate: f64,
}

/// Per-setup breakdown, best net first. Setups without trades are omitted,
/// as are trades whose setup no longer exists.
pub fn setup_performance(trades: &[Trade], setups: &[SetupType]) -> Vec<SetupPerformance> {
    let mut rows: Vec<SetupPerformance> = setups
        .iter()
        .filter_map(|setup| {
            let matching: Vec<&Trade> = trades.iter().filter(|t| t.setup_id == setup.id).collect();
            if matching.is_empty() {
                return None;
            }
            // Break-even trades count as losing
            let (winners, losers): (Vec<&Trade>, Vec<&Trade>) =
                matching.iter().copied().partition(|t| t.financial_result > Decimal::ZERO);
            let profit = saturating_sum(winners.iter().map(|t| t.financial_result));
            let actual_loss = saturating_sum(losers.iter().map(|t| t.financial_result));
            Some(SetupPerformance {
                setup_id: setup.id.clone(),
                name: setup.name.clone(),
                profit,
                loss: actual_loss.abs(),
                actual_loss,
                net: profit + actual_loss,
                wins: winners.len(),
                losses: losers.len(),
                total_trades: matching.len(),
                win_rate: percentage(winners.len(), matching.len()),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.net.cmp(&a.net));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyProfit {
    pub date: NaiveDate,
    pub profit: Decimal,
}

/// Net result per calendar day, oldest first. Each call rebuilds the
/// sequence from the given trades.
pub fn profit_by_day(trades: &[Trade]) -> impl Iterator<Item = DailyProfit> {
    let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for trade in trades {
        let day = by_day.entry(trade.entry_date()).or_insert(Decimal::ZERO);
        *day = day.saturating_add(trade.financial_result);
    }
    by_day
        .into_iter()
        .map(|(date, profit)| DailyProfit { date, profit })
}

/// Labels of the five fixed time-of-day bands
pub const TIME_BANDS: [&str; 5] = ["08-10", "10-12", "12-14", "14-16", "16+"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub label: &'static str,
    pub profit: Decimal,
    pub trades: usize,
}

/// Band index for a local hour. Hours before 08:00 land in the "16+" band.
pub fn time_band(hour: u32) -> usize {
    if (8..10).contains(&hour) {
        0
    } else if (10..12).contains(&hour) {
        1
    } else if (12..14).contains(&hour) {
        2
    } else if (14..16).contains(&hour) {
        3
    } else {
        4
    }
}

pub fn time_of_day_performance(trades: &[Trade]) -> Vec<TimeBucket> {
    let mut buckets: Vec<TimeBucket> = TIME_BANDS
        .iter()
        .map(|&label| TimeBucket {
            label,
            profit: Decimal::ZERO,
            trades: 0,
        })
        .collect();
    for trade in trades {
        let bucket = &mut buckets[time_band(trade.entry_time.hour())];
        bucket.profit = bucket.profit.saturating_add(trade.financial_result);
        bucket.trades += 1;
    }
    buckets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WinLoss {
    pub win: usize,
    pub loss: usize,
}

pub fn win_loss_distribution(trades: &[Trade]) -> WinLoss {
    let win = trades.iter().filter(|t| t.is_win()).count();
    WinLoss {
        win,
        loss: trades.len() - win,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MistakeBreakdown {
    pub mistake_type_id: Option<String>,
    pub name: String,
    pub count: usize,
}

/// Mistake counts per type, most frequent first
pub fn mistake_breakdown(trades: &[Trade], mistake_types: &[MistakeType]) -> Vec<MistakeBreakdown> {
    let mut counts: HashMap<Option<&str>, usize> = HashMap::new();
    for trade in trades.iter().filter(|t| t.is_mistake) {
        *counts.entry(trade.mistake_type_id.as_deref()).or_insert(0) += 1;
    }
    let mut rows: Vec<MistakeBreakdown> = counts
        .into_iter()
        .map(|(id, count)| {
            let name = id
                .and_then(|id| mistake_types.iter().find(|m| m.id == id))
                .map(|m| m.name.clone())
                .unwrap_or_else(|| UNKNOWN_MISTAKE.to_string());
            MistakeBreakdown {
                mistake_type_id: id.map(str::to_string),
                name,
                count,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalState {
    Reached,
    Progressing,
    Behind,
}

impl fmt::Display for GoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalState::Reached => write!(f, "reached"),
            GoalState::Progressing => write!(f, "progressing"),
            GoalState::Behind => write!(f, "behind"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyGoalStatus {
    pub target: Decimal,
    /// Percent of target, clamped to [0, 100]
    pub progress: Decimal,
    pub state: GoalState,
}

/// Progress towards the daily profit target. Without an explicit target the
/// settings' `initial_capital * daily_profit_target / 100` is used.
pub fn daily_goal_status(
    daily_trade_profit: Decimal,
    target: Option<Decimal>,
    settings: &RiskSettings,
) -> DailyGoalStatus {
    let target = target.unwrap_or_else(|| settings.daily_profit_amount());
    let raw_progress = if target > Decimal::ZERO {
        percent_of(daily_trade_profit, target)
    } else if daily_trade_profit >= target {
        dec!(100)
    } else {
        Decimal::ZERO
    };
    let progress = raw_progress.clamp(Decimal::ZERO, dec!(100));
    let state = if daily_trade_profit >= target {
        GoalState::Reached
    } else if progress >= dec!(50) {
        GoalState::Progressing
    } else {
        GoalState::Behind
    };
    DailyGoalStatus {
        target,
        progress,
        state,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskStatus {
    Safe,
    Warning,
    Danger,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskStatus::Safe => write!(f, "safe"),
            RiskStatus::Warning => write!(f, "warning"),
            RiskStatus::Danger => write!(f, "danger"),
        }
    }
}

/// Safe below 75% of the limit, warning from 75%, danger at or above it.
/// A non-positive limit is danger as soon as any risk has been used.
pub fn risk_status(daily_risk_used: Decimal, max_daily_risk: Decimal) -> RiskStatus {
    if max_daily_risk <= Decimal::ZERO {
        return if daily_risk_used > Decimal::ZERO {
            RiskStatus::Danger
        } else {
            RiskStatus::Safe
        };
    }
    if daily_risk_used >= max_daily_risk {
        RiskStatus::Danger
    } else if daily_risk_used >= max_daily_risk * dec!(0.75) {
        RiskStatus::Warning
    } else {
        RiskStatus::Safe
    }
}

/// Share of the daily risk budget consumed, for progress displays
pub fn risk_usage_percent(daily_risk_used: Decimal, max_daily_risk: Decimal) -> f64 {
    if max_daily_risk <= Decimal::ZERO {
        return 0.0;
    }
    percent_of(daily_risk_used, max_daily_risk)
        .to_f64()
        .unwrap_or(0.0)
}
