// Trading Journal Library
// Trades, daily journals, risk settings and the analytics derived from them

pub mod types;
pub mod models;
pub mod config;
pub mod persistence;
pub mod reducer;
pub mod metrics;
pub mod scheduler;
pub mod journal;

// Re-export commonly used types
pub use types::*;
pub use models::*;
pub use persistence::*;
pub use reducer::{reduce, Command, ReduceContext};
pub use metrics::{DailyGoalStatus, GoalState, RiskStatus};
pub use scheduler::DailyResetScheduler;
pub use journal::{Clock, FixedClock, RuleViolation, SystemClock, TradingJournal};

// Append-only history.log: one timestamped line per applied journal command
use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

static HISTORY_LOG: OnceLock<Mutex<File>> = OnceLock::new();

/// Route journal history to `file`; only the first call takes effect
pub fn init_history_file(file: File) {
    if HISTORY_LOG.set(Mutex::new(file)).is_err() {
        tracing::debug!("history.log already open, keeping the first file");
    }
}

/// Write `line` verbatim to history.log; a no-op before `init_history_file`
pub fn log_to_history(line: &str) {
    let Some(log) = HISTORY_LOG.get() else {
        return;
    };
    match log.lock() {
        Ok(mut file) => {
            if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
                tracing::warn!("⚠️  history.log write failed: {}", e);
            }
        }
        Err(_) => tracing::warn!("⚠️  history.log lock poisoned, entry dropped"),
    }
}

/// Record a journal event such as `ADD_TRADE | trades=3` with a local timestamp
pub fn log_journal_event(event: &str) {
    let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z");
    log_to_history(&format!("[{}] {}\n", timestamp, event));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn journal_events_are_appended_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log");
        init_history_file(File::create(&path).unwrap());

        log_journal_event("RESET_DAILY_METRICS | trades=0");
        let content = fs::read_to_string(&path).unwrap();
        // other tests in this binary may log concurrently
        assert!(content
            .lines()
            .any(|l| l.starts_with('[') && l.ends_with("] RESET_DAILY_METRICS | trades=0")));
    }
}
