use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::engine::{BookingEngine, EngineError};
use crate::messages;
use crate::observability::{SWEEP_DURATION_SECONDS, SWEEP_EXPIRED_TOTAL, SWEEP_FAILURES_TOTAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Bookings checking out on or before this day were due.
    pub cutoff: NaiveDate,
    pub expired: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep held the lock; nothing was done.
    Skipped,
}

/// Moves overdue PENDING/CONFIRMED bookings to EXPIRED. At most one sweep
/// runs at a time per `Sweeper`.
pub struct Sweeper {
    engine: Arc<BookingEngine>,
    running: Mutex<()>,
}

impl Sweeper {
    pub fn new(engine: Arc<BookingEngine>) -> Self {
        Self {
            engine,
            running: Mutex::new(()),
        }
    }

    pub async fn sweep(&self) -> Result<SweepOutcome, EngineError> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("expiration sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        };
        let started = Instant::now();
        let today = self.engine.clock().today();
        let cutoff = today.pred_opt().unwrap_or(NaiveDate::MIN);

        let candidates = self.engine.expired_candidates(cutoff).await?;
        let mut report = SweepReport {
            cutoff,
            expired: 0,
            failed: 0,
        };
        if candidates.is_empty() {
            info!(%cutoff, "expiration sweep: nothing to expire");
            self.engine.notify(messages::no_expirations(cutoff));
            return Ok(SweepOutcome::Completed(report));
        }

        for candidate in candidates {
            match self.engine.expire(candidate.id, cutoff).await {
                Ok(Some(expired)) => {
                    report.expired += 1;
                    info!(booking_id = %expired.id, resource_id = %expired.resource_id, "booking expired");
                    self.engine.notify(messages::booking_expired(&expired));
                }
                Ok(None) => debug!(booking_id = %candidate.id, "no longer due for expiry"),
                Err(e) => {
                    report.failed += 1;
                    error!(booking_id = %candidate.id, error = %e, "failed to expire booking");
                }
            }
        }

        if report.expired > 0 {
            self.engine.invalidate_bookings();
        }
        metrics::counter!(SWEEP_EXPIRED_TOTAL).increment(report.expired as u64);
        metrics::counter!(SWEEP_FAILURES_TOTAL).increment(report.failed as u64);
        metrics::histogram!(SWEEP_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(%cutoff, expired = report.expired, failed = report.failed, "expiration sweep finished");
        Ok(SweepOutcome::Completed(report))
    }
}

/// First instant strictly after `now` whose UTC time of day is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        return today;
    }
    today.checked_add_days(Days::new(1)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Background task: one sweep per day at `at` (UTC). Sweeps run inline in
/// this loop, so consecutive runs never overlap. Stops when `shutdown` flips
/// to true.
pub async fn run_sweeper(sweeper: Arc<Sweeper>, at: NaiveTime, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = sweeper.engine.clock().now();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next, "expiration sweep scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        match sweeper.sweep().await {
            Ok(SweepOutcome::Completed(_)) => {}
            Ok(SweepOutcome::Skipped) => warn!("scheduled sweep skipped: previous sweep still running"),
            Err(e) => error!(error = %e, "expiration sweep aborted"),
        }
    }
    info!("expiration sweeper stopped");
}
