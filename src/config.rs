// Configuration: command-line arguments layered over an optional JSON file

use crate::persistence::{state_slot_for, STATE_SLOT};
use crate::types::{Direction, RiskSettings, TrendPosition};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = ".trading-journal";

/// CLI Configuration
#[derive(Parser, Debug)]
#[command(name = "trading-journal")]
#[command(about = "Personal trading journal with daily risk tracking")]
pub struct CliConfig {
    /// Directory holding the saved journal slots and history.log
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file path (JSON format)
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Log a trade
    AddTrade {
        /// Asset symbol (e.g. EURUSD)
        #[arg(long)]
        asset: String,
        /// Setup id or name
        #[arg(long)]
        setup: String,
        /// buy or sell
        #[arg(long)]
        direction: Direction,
        /// with or against the trend
        #[arg(long, default_value = "with")]
        trend: TrendPosition,
        /// Signed result of the trade
        #[arg(long, allow_hyphen_values = true)]
        result: Decimal,
        #[arg(long, default_value = "1")]
        leverage: Decimal,
        /// Entry time (RFC 3339); defaults to now
        #[arg(long)]
        entry: Option<DateTime<Local>>,
        /// Exit time (RFC 3339); omit for an open trade
        #[arg(long)]
        exit: Option<DateTime<Local>>,
        #[arg(long)]
        notes: Option<String>,
        /// Mistake type id or name; marks the trade as a mistake
        #[arg(long)]
        mistake: Option<String>,
        /// Mark as an exemplary trade
        #[arg(long)]
        model: bool,
        /// Refuse the trade without today's journal or with the risk budget spent
        #[arg(long)]
        strict: bool,
    },
    /// List trades, optionally for one day
    Trades {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a trade by id
    DeleteTrade { id: String },
    /// Write the daily journal entry
    Journal {
        /// Past mistakes were reviewed
        #[arg(long)]
        reviewed: bool,
        #[arg(long, default_value = "")]
        comment: String,
        /// Whether yesterday's goal was hit (omit when not applicable)
        #[arg(long)]
        goal_hit: Option<bool>,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Refuse a second entry for the same date
        #[arg(long)]
        strict: bool,
    },
    /// Show or change risk settings
    Settings {
        #[arg(long)]
        capital: Option<Decimal>,
        /// Daily profit target in percent
        #[arg(long)]
        target: Option<Decimal>,
        /// Maximum daily risk in percent
        #[arg(long)]
        max_risk: Option<Decimal>,
    },
    /// Manage setups
    Setups {
        #[command(subcommand)]
        action: ReferenceAction,
    },
    /// Manage mistake types
    Mistakes {
        #[command(subcommand)]
        action: ReferenceAction,
    },
    /// Manage assets
    Assets {
        #[command(subcommand)]
        action: ReferenceAction,
    },
    /// Performance analytics
    Stats {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Trader id to review (mentors only)
        #[arg(long)]
        trader: Option<String>,
    },
    /// Daily P&L, risk status and goal progress
    Status,
    /// Zero the daily counters now
    Reset,
    /// Log in against the built-in account list
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Keep running and reset the daily counters at every local midnight
    Daemon,
}

#[derive(Subcommand, Debug)]
pub enum ReferenceAction {
    List,
    Add { name: String },
    Delete { id: String },
}

/// JSON configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonConfig {
    pub storage: Option<StorageJson>,
    pub risk: Option<RiskJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageJson {
    #[serde(rename = "data_dir")]
    pub data_dir: Option<PathBuf>,
    #[serde(rename = "state_slot")]
    pub state_slot: Option<String>,
}

/// Settings for a journal that has never been saved
#[derive(Debug, Clone, Deserialize)]
pub struct RiskJson {
    #[serde(rename = "initial_capital")]
    pub initial_capital: Option<f64>,
    #[serde(rename = "daily_profit_target")]
    pub daily_profit_target: Option<f64>,
    #[serde(rename = "max_daily_risk")]
    pub max_daily_risk: Option<f64>,
}

impl CliConfig {
    /// Load configuration from JSON file; a missing file means no overrides
    pub fn load_json_config(&self) -> Result<JsonConfig> {
        let config_path = &self.config;

        if !config_path.exists() {
            return Ok(JsonConfig::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let json_config: JsonConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        Ok(json_config)
    }

    /// Data directory from CLI arg, config file, or environment variable (in that order)
    pub fn get_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| {
                self.load_json_config()
                    .ok()
                    .and_then(|cfg| cfg.storage?.data_dir)
            })
            .or_else(|| std::env::var("TRADING_JOURNAL_DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    /// Snapshot slot: per-user when someone is logged in, else the configured one
    pub fn get_state_slot(&self, user_id: Option<&str>) -> String {
        if user_id.is_some() {
            return state_slot_for(user_id);
        }
        self.load_json_config()
            .ok()
            .and_then(|cfg| cfg.storage?.state_slot)
            .unwrap_or_else(|| STATE_SLOT.to_string())
    }

    /// Risk settings for a fresh journal, built-in defaults overridden by config.json
    pub fn get_default_settings(&self) -> RiskSettings {
        let defaults = RiskSettings::default();
        let Some(risk) = self.load_json_config().ok().and_then(|cfg| cfg.risk) else {
            return defaults;
        };
        let pick = |value: Option<f64>, fallback: Decimal| {
            value
                .and_then(|v| Decimal::try_from(v).ok())
                .unwrap_or(fallback)
        };
        RiskSettings::new(
            pick(risk.initial_capital, defaults.initial_capital),
            pick(risk.daily_profit_target, defaults.daily_profit_target),
            pick(risk.max_daily_risk, defaults.max_daily_risk),
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.load_json_config()?;
        validate_settings(&self.get_default_settings())?;
        if let CliCommand::Settings {
            capital,
            target,
            max_risk,
        } = &self.command
        {
            if capital.is_some_and(|c| c <= Decimal::ZERO) {
                anyhow::bail!("--capital must be positive");
            }
            if target.is_some_and(|t| t <= Decimal::ZERO) {
                anyhow::bail!("--target must be positive");
            }
            if max_risk.is_some_and(|r| r <= Decimal::ZERO || r > dec!(100)) {
                anyhow::bail!("--max-risk must be in (0, 100]");
            }
        }
        Ok(())
    }
}

/// Check the structural constraints of a settings record
pub fn validate_settings(settings: &RiskSettings) -> Result<()> {
    if settings.initial_capital <= Decimal::ZERO {
        anyhow::bail!("initial capital must be positive (got {})", settings.initial_capital);
    }
    if settings.daily_profit_target <= Decimal::ZERO {
        anyhow::bail!("daily profit target must be positive (got {})", settings.daily_profit_target);
    }
    if settings.max_daily_risk <= Decimal::ZERO || settings.max_daily_risk > dec!(100) {
        anyhow::bail!("max daily risk must be in (0, 100] (got {})", settings.max_daily_risk);
    }
    Ok(())
}
