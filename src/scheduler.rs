// Daily reset scheduler: zeroes the daily counters at local midnight

use crate::reducer::Command;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// The next local midnight strictly after `now`.
///
/// When a DST shift skips midnight, the first valid instant of that hour is used.
pub fn next_local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let tomorrow = now.date_naive().succ_opt().unwrap_or_else(|| now.date_naive());
    let midnight = tomorrow.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(midnight + ChronoDuration::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| now + ChronoDuration::days(1))
}

pub fn duration_until_next_midnight(now: DateTime<Local>) -> Duration {
    (next_local_midnight(now) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Owns the pending midnight timer. Dropping the scheduler cancels it.
///
/// Fires missed while the process was suspended are not replayed; the next
/// natural midnight resets whatever has accumulated.
pub struct DailyResetScheduler {
    handle: Option<JoinHandle<()>>,
}

impl DailyResetScheduler {
    /// Start the timer on the current tokio runtime using the system clock
    pub fn spawn(sender: UnboundedSender<Command>) -> Self {
        Self::spawn_with_clock(sender, Local::now)
    }

    /// Start the timer with a custom notion of "now"
    pub fn spawn_with_clock<F>(sender: UnboundedSender<Command>, now: F) -> Self
    where
        F: Fn() -> DateTime<Local> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                let delay = duration_until_next_midnight(now());
                debug!("🌙 Next daily reset in {}s", delay.as_secs());
                sleep(delay).await;

                if sender.send(Command::ResetDailyMetrics).is_err() {
                    info!("🌙 Command channel closed, stopping daily reset scheduler");
                    break;
                }
                info!("🌙 Midnight reached, daily counters reset requested");
                crate::log_journal_event("SCHEDULER | midnight reset dispatched");
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Clear the pending timer; safe to call more than once
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("🌙 Daily reset scheduler cancelled");
        }
    }
}

impl Drop for DailyResetScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
