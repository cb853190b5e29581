//! Background carry-forward scheduler: periodic cron check.
//!
//! Spawns a background thread that checks every 30 seconds whether a cron
//! tick has passed since the previous check, evaluated in the configured
//! UTC offset. When one has, the engine runs for that day. Runs are
//! idempotent, so a tick that fires right after startup is harmless and
//! covers a day the process was down for.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;

use super::error::CarryForwardError;
use crate::config::ConfigError;
use crate::core_state::CoreState;
use crate::models::RunTrigger;

/// Check interval: every 30 seconds.
const CHECK_INTERVAL_SECS: u64 = 30;

/// Sleep granularity for shutdown responsiveness (5 seconds).
const SLEEP_GRANULARITY_SECS: u64 = 5;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for
/// seconds. The `cron` crate wants `sec min hour day-of-month month day-of-week`.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

pub fn parse_cron(expr: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(&normalize_cron(expr)).map_err(|e| ConfigError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Cron schedule plus the instant it was last evaluated.
pub struct CronTrigger {
    schedule: Schedule,
    offset: FixedOffset,
    last_check: Option<DateTime<Utc>>,
}

impl CronTrigger {
    pub fn new(schedule: Schedule, offset: FixedOffset) -> Self {
        Self {
            schedule,
            offset,
            last_check: None,
        }
    }

    /// True when a tick falls in `(last_check, now]`. On the first call the
    /// window reaches back one day. The window always advances to `now`.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let from = self
            .last_check
            .unwrap_or(now - chrono::Duration::days(1))
            .with_timezone(&self.offset);
        self.last_check = Some(now);

        match self.schedule.after(&from).next() {
            Some(next) => next.with_timezone(&Utc) <= now,
            None => false,
        }
    }
}

/// Handle for the background scheduler thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct CarryForwardSchedulerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl CarryForwardSchedulerHandle {
    /// Request graceful shutdown. A run in progress completes first.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for CarryForwardSchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the background scheduler on a separate thread.
///
/// Fails up front if the configured cron expression does not parse.
pub fn start_background_scheduler(
    state: Arc<CoreState>,
) -> Result<CarryForwardSchedulerHandle, CarryForwardError> {
    let schedule = parse_cron(&state.config().carry_forward_cron)?;
    let trigger = CronTrigger::new(schedule, state.config().utc_offset);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::Builder::new()
        .name("carry-forward".into())
        .spawn(move || {
            tracing::info!(
                cron = %state.config().carry_forward_cron,
                "Carry-forward scheduler started (check every {}s)",
                CHECK_INTERVAL_SECS
            );
            scheduler_loop(&state, trigger, &flag);
        })
        .map_err(CarryForwardError::SchedulerSpawn)?;

    Ok(CarryForwardSchedulerHandle {
        shutdown,
        handle: Some(handle),
    })
}

fn scheduler_loop(state: &CoreState, mut trigger: CronTrigger, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        let now = Utc::now();
        if trigger.poll(now) {
            run_scheduled(state, now);
        }

        // Sleep in small increments for responsive shutdown
        for _ in 0..(CHECK_INTERVAL_SECS / SLEEP_GRANULARITY_SECS) {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(Duration::from_secs(SLEEP_GRANULARITY_SECS));
        }
    }
    tracing::info!("Carry-forward scheduler shutting down");
}

fn run_scheduled(state: &CoreState, now: DateTime<Utc>) {
    let today = state.clock().date_at(now);
    match state.carry_forward(Some(today), RunTrigger::Scheduled) {
        Ok(report) => {
            tracing::info!(
                run_date = %today,
                created = report.created_count(),
                "Scheduled carry-forward finished"
            );
        }
        Err(e) => {
            tracing::warn!(run_date = %today, error = %e, "Scheduled carry-forward failed, retrying at next tick");
        }
    }
}
