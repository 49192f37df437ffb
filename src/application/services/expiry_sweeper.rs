//! Background sweeps: expire unpaid bookings and lift elapsed delays.
//!
//! Both sweeps are plain callable operations; the periodic task just
//! invokes them on a timer. Re-running a sweep, or running two at once,
//! converges on the same state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Duration;
use tracing::{info, warn};

use super::booking::BookingService;
use super::schedule::ScheduleService;
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_bookings: usize,
    pub restored_schedules: usize,
}

pub struct ExpirySweeper {
    repos: Arc<dyn RepositoryProvider>,
    bookings: Arc<BookingService>,
    schedules: Arc<ScheduleService>,
    batch_size: u64,
}

impl ExpirySweeper {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        bookings: Arc<BookingService>,
        schedules: Arc<ScheduleService>,
        batch_size: u64,
    ) -> Self {
        Self {
            repos,
            bookings,
            schedules,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> DomainResult<SweepReport> {
        let expired_bookings = self.sweep_expired_bookings(now).await?;
        let restored_schedules = self.sweep_delayed_schedules(now).await?;
        Ok(SweepReport {
            expired_bookings,
            restored_schedules,
        })
    }

    /// Sweep A: PENDING bookings past their payment deadline
    pub async fn sweep_expired_bookings(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let overdue = self
            .repos
            .bookings()
            .find_expired_pending(now, self.batch_size)
            .await?;

        if overdue.is_empty() {
            return Ok(0);
        }

        info!(count = overdue.len(), "Expiring overdue bookings");

        let mut expired = 0;
        for booking in overdue {
            match self.bookings.expire(&booking.id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => warn!(booking_code = %booking.code, error = %e, "Failed to expire booking"),
            }
        }

        metrics::counter!("sweep_expired_bookings_total").increment(expired as u64);
        Ok(expired)
    }

    /// Sweep B: DELAYED occurrences whose delay deadline has passed
    pub async fn sweep_delayed_schedules(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let elapsed = self.repos.schedules().find_delay_elapsed(now).await?;

        let mut restored = 0;
        for occurrence in elapsed {
            match self.schedules.recover_if_elapsed(occurrence.id, now).await {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    occurrence_id = occurrence.id,
                    error = %e,
                    "Failed to restore delayed schedule"
                ),
            }
        }

        if restored > 0 {
            metrics::counter!("sweep_restored_schedules_total").increment(restored as u64);
        }
        Ok(restored)
    }
}

/// Start the expiry sweep background task.
///
/// Runs both sweeps every `check_interval_secs` until shutdown.
pub fn start_expiry_sweep_task(
    sweeper: Arc<ExpirySweeper>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(check_interval = check_interval_secs, "Expiry sweep task started");

        let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = sweeper.run_once(Utc::now()).await {
                        warn!(error = %e, "Expiry sweep error");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Expiry sweep task shutting down");
                    break;
                }
            }
        }

        info!("Expiry sweep task stopped");
    })
}
