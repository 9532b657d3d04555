// Main entry point for the trading journal CLI

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use trading_journal::config::{validate_settings, CliCommand, CliConfig, ReferenceAction};
use trading_journal::metrics;
use trading_journal::{
    init_history_file, log_journal_event, state_slot_for, DailyResetScheduler, FileSlotStore, JournalDraft,
    RiskSettings, SessionPersistence, Snapshot, StatePersistence, Trade, TradeDraft,
    TradingJournal, User, UserDirectory,
};

type Journal = TradingJournal<Arc<FileSlotStore>>;

fn print_trade(snapshot: &Snapshot, trade: &Trade) {
    let mistake = if trade.is_mistake {
        let label = trade
            .mistake_type_id
            .as_deref()
            .and_then(|id| snapshot.mistake_type_name(id))
            .unwrap_or(trading_journal::UNKNOWN_MISTAKE);
        format!(" | mistake={}", label)
    } else {
        String::new()
    };
    println!(
        "{} | {} | {} {} | setup={} | result={} | lev={}x | {}{}{}",
        trade.id,
        trade.entry_time.format("%Y-%m-%d %H:%M"),
        trade.direction,
        trade.asset,
        snapshot.setup_label(&trade.setup_id),
        trade.financial_result,
        trade.leverage,
        if trade.is_open() { "open" } else { "closed" },
        mistake,
        if trade.is_model_trade { " | ⭐ model" } else { "" },
    );
}

fn print_status(journal: &Journal) {
    let snapshot = journal.snapshot();
    let goal = journal.daily_goal_status();
    println!("📅 Today        : {}", journal.today());
    println!("💰 Daily P&L    : {}", snapshot.daily_trade_profit);
    println!(
        "🛡️  Risk used    : {}% of {}% ({})",
        snapshot.daily_risk_used.round_dp(2),
        snapshot.risk_settings.max_daily_risk,
        journal.daily_risk_status()
    );
    println!(
        "🎯 Daily goal   : {} of {} ({}%, {})",
        snapshot.daily_trade_profit,
        goal.target,
        goal.progress.round_dp(1),
        goal.state
    );
    println!(
        "📓 Journal done : {}",
        if journal.has_daily_journal() { "yes" } else { "no" }
    );
    if !journal.check_risk_limit() {
        println!("⚠️  Daily risk limit reached - stop trading for today");
    }
}

fn print_stats(snapshot: &Snapshot, from: Option<NaiveDate>, to: Option<NaiveDate>) {
    let trades = match (from, to) {
        (None, None) => snapshot.trades.clone(),
        (from, to) => metrics::trades_between(
            &snapshot.trades,
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        ),
    };
    let distribution = metrics::win_loss_distribution(&trades);
    println!("📊 Trades       : {}", trades.len());
    println!("   Total P&L    : {}", metrics::total_profit_loss(&trades));
    println!("   Win rate     : {}%", metrics::win_rate(&trades));
    println!("   Wins/Losses  : {}/{}", distribution.win, distribution.loss);
    println!("   Mistakes     : {}", metrics::mistake_count(&trades));
    println!("   Model trades : {}", metrics::model_trade_count(&trades));
    println!("   Avg leverage : {}x", metrics::average_leverage(&trades).round_dp(2));

    println!("🧩 By setup:");
    for row in metrics::setup_performance(&trades, &snapshot.setups) {
        println!(
            "   {:<12} net={} profit={} loss={} wins={} losses={} win_rate={:.1}%",
            row.name, row.net, row.profit, row.loss, row.wins, row.losses, row.win_rate
        );
    }

    println!("🕒 By time of day:");
    for bucket in metrics::time_of_day_performance(&trades) {
        println!("   {:<6} pnl={} trades={}", bucket.label, bucket.profit, bucket.trades);
    }

    println!("📈 By day:");
    for day in metrics::profit_by_day(&trades) {
        println!("   {} {}", day.date, day.profit);
    }

    let mistakes = metrics::mistake_breakdown(&trades, &snapshot.mistake_types);
    if !mistakes.is_empty() {
        println!("🚩 Mistakes:");
        for row in mistakes {
            println!("   {:<20} {}", row.name, row.count);
        }
    }
}

fn reference_command(
    journal: &mut Journal,
    action: ReferenceAction,
    list: fn(&Snapshot) -> Vec<(String, String)>,
    add: fn(&mut Journal, &str) -> String,
    delete: fn(&mut Journal, &str),
) {
    match action {
        ReferenceAction::List => {
            for (id, label) in list(journal.snapshot()) {
                println!("{} | {}", id, label);
            }
        }
        ReferenceAction::Add { name } => {
            let id = add(journal, &name);
            println!("✅ Added {} ({})", name, id);
        }
        ReferenceAction::Delete { id } => {
            delete(journal, &id);
            println!("🗑️  Deleted {} (trades keep their reference)", id);
        }
    }
}

async fn run_daemon(journal: &mut Journal) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = DailyResetScheduler::spawn(tx);
    println!("🌙 Daily reset scheduler running (Ctrl+C to stop)");
    info!("🌙 Daemon started");

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else { break };
                journal.dispatch(command);
                println!("🔁 Daily counters reset at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
                print_status(journal);
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                println!("👋 Shutting down");
                break;
            }
        }
    }

    scheduler.cancel();
    Ok(())
}

fn resolve_user_for_stats(
    current: Option<&User>,
    directory: &UserDirectory,
    trader: &str,
) -> Result<()> {
    let viewer = current.context("Log in as a mentor to review another trader")?;
    if !viewer.can_view(trader) {
        anyhow::bail!("{} is not allowed to view trader {}", viewer.name, trader);
    }
    if directory.find(trader).is_none() {
        anyhow::bail!("Unknown trader {}", trader);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (tracing to stderr)
    tracing_subscriber::fmt::init();

    // Parse CLI arguments
    let config = CliConfig::parse();
    config.validate()?;

    let data_dir = config.get_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    // Open history.log for append and initialize global history logger
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("history.log"))?;
    init_history_file(log_file);

    let store = Arc::new(FileSlotStore::new(&data_dir));
    let session = SessionPersistence::new(store.clone());
    let directory = UserDirectory::mock();

    match &config.command {
        CliCommand::Login { email, password } => {
            let user = directory
                .authenticate(email, password)
                .context("Invalid email or password")?;
            session.save(&user)?;
            log_journal_event(&format!("LOGIN | user={}", user.id));
            println!("✅ Logged in as {} ({:?})", user.name, user.role);
            return Ok(());
        }
        CliCommand::Logout => {
            session.clear()?;
            log_journal_event("LOGOUT");
            println!("👋 Logged out");
            return Ok(());
        }
        _ => {}
    }

    let current_user = session.load();
    let slot = config.get_state_slot(current_user.as_ref().map(|u| u.id.as_str()));
    let defaults = Snapshot::with_settings(config.get_default_settings());
    let persistence = StatePersistence::new(store.clone(), slot).with_defaults(defaults.clone());
    let mut journal: Journal = TradingJournal::open(persistence);

    match config.command {
        CliCommand::AddTrade {
            asset,
            setup,
            direction,
            trend,
            result,
            leverage,
            entry,
            exit,
            notes,
            mistake,
            model,
            strict,
        } => {
            let snapshot = journal.snapshot();
            let setup_id = match snapshot.find_setup(&setup) {
                Some(s) => s.id.clone(),
                None => {
                    warn!("Setup '{}' is not in the setup list", setup);
                    setup
                }
            };
            if snapshot.asset_by_symbol(&asset).is_none() {
                warn!("Asset '{}' is not in the asset list", asset);
            }
            let mut draft = TradeDraft::new(
                asset.to_uppercase(),
                setup_id,
                direction,
                entry.unwrap_or_else(Local::now),
                result,
            )
            .trend_position(trend)
            .leverage(leverage)
            .model_trade(model);
            if let Some(exit) = exit {
                draft = draft.exit_time(exit);
            }
            if let Some(notes) = notes {
                draft = draft.notes(notes);
            }
            if let Some(mistake) = mistake {
                let mistake_id = snapshot
                    .find_mistake_type(&mistake)
                    .map(|m| m.id.clone())
                    .unwrap_or(mistake);
                draft = draft.mistake(mistake_id);
            }

            if !strict {
                if !journal.has_daily_journal() {
                    println!("⚠️  Today's journal is not completed yet");
                }
                if !journal.check_risk_limit() {
                    println!("⚠️  Daily risk limit already reached");
                }
            }
            let id = if strict {
                journal.try_add_trade(draft)?
            } else {
                journal.add_trade(draft)
            };
            println!("✅ Trade logged: {}", id);
            print_status(&journal);
        }
        CliCommand::Trades { date } => {
            let snapshot = journal.snapshot();
            let mut trades: Vec<&Trade> = snapshot
                .trades
                .iter()
                .filter(|t| date.map_or(true, |d| t.entry_date() == d))
                .collect();
            trades.sort_by_key(|t| t.entry_time);
            for trade in trades {
                print_trade(snapshot, trade);
            }
        }
        CliCommand::DeleteTrade { id } => {
            if journal.snapshot().trade(&id).is_none() {
                anyhow::bail!("No trade with id {}", id);
            }
            journal.delete_trade(&id);
            println!("🗑️  Trade {} deleted", id);
            print_status(&journal);
        }
        CliCommand::Journal {
            reviewed,
            comment,
            goal_hit,
            date,
            strict,
        } => {
            let draft = JournalDraft {
                date: date.unwrap_or_else(|| journal.today()),
                error_review_completed: reviewed,
                daily_comment: comment,
                previous_day_goal_hit: goal_hit,
            };
            let id = if strict {
                journal.try_add_journal(draft)?
            } else {
                journal.add_journal(draft)
            };
            println!("📓 Journal saved: {}", id);
        }
        CliCommand::Settings {
            capital,
            target,
            max_risk,
        } => {
            let current = journal.snapshot().risk_settings.clone();
            if capital.is_none() && target.is_none() && max_risk.is_none() {
                println!("Initial capital : {}", current.initial_capital);
                println!("Profit target   : {}%", current.daily_profit_target);
                println!("Max daily risk  : {}%", current.max_daily_risk);
                println!("Daily risk limit: {}", current.daily_risk_limit);
                return Ok(());
            }
            let updated = RiskSettings::new(
                capital.unwrap_or(current.initial_capital),
                target.unwrap_or(current.daily_profit_target),
                max_risk.unwrap_or(current.max_daily_risk),
            );
            validate_settings(&updated)?;
            journal.update_risk_settings(updated);
            println!("✅ Risk settings updated");
        }
        CliCommand::Setups { action } => reference_command(
            &mut journal,
            action,
            |s| s.setups.iter().map(|x| (x.id.clone(), x.name.clone())).collect(),
            |j, name| j.add_setup(name),
            |j, id| j.delete_setup(id),
        ),
        CliCommand::Mistakes { action } => reference_command(
            &mut journal,
            action,
            |s| s.mistake_types.iter().map(|x| (x.id.clone(), x.name.clone())).collect(),
            |j, name| j.add_mistake_type(name),
            |j, id| j.delete_mistake_type(id),
        ),
        CliCommand::Assets { action } => reference_command(
            &mut journal,
            action,
            |s| s.assets.iter().map(|x| (x.id.clone(), x.symbol.clone())).collect(),
            |j, name| j.add_asset(name),
            |j, id| j.delete_asset(id),
        ),
        CliCommand::Stats { from, to, trader } => match trader {
            Some(trader) => {
                resolve_user_for_stats(current_user.as_ref(), &directory, &trader)?;
                let mentee = StatePersistence::new(store.clone(), state_slot_for(Some(&trader)))
                    .with_defaults(defaults)
                    .load();
                println!("👀 Reviewing trader {}", trader);
                print_stats(&mentee, from, to);
            }
            None => print_stats(journal.snapshot(), from, to),
        },
        CliCommand::Status => print_status(&journal),
        CliCommand::Reset => {
            journal.reset_daily_metrics();
            println!("🔁 Daily counters reset");
        }
        CliCommand::Daemon => run_daemon(&mut journal).await?,
        CliCommand::Login { .. } | CliCommand::Logout => {}
    }

    Ok(())
}
