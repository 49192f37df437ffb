//! Polling fallback for payments whose push notification never arrived

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::Duration as TickInterval;
use tracing::{debug, info, warn};

use super::reconciliation::{ReconcileOutcome, ReconciliationService};
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Minimum age of a PENDING payment, and minimum gap between polls
    pub poll_interval: Duration,
    /// Give up after this many polls and leave the booking to expiry
    pub max_attempts: u32,
    pub batch_size: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::seconds(60),
            max_attempts: 10,
            batch_size: 200,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSweepReport {
    pub polled: usize,
    pub applied: usize,
    pub failed: usize,
}

pub struct PaymentPoller {
    repos: Arc<dyn RepositoryProvider>,
    reconciliation: Arc<ReconciliationService>,
    config: PollerConfig,
}

impl PaymentPoller {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        reconciliation: Arc<ReconciliationService>,
        config: PollerConfig,
    ) -> Self {
        Self {
            repos,
            reconciliation,
            config,
        }
    }

    /// One pass over due PENDING payments. A failure on one payment is
    /// logged and does not stop the pass.
    pub async fn poll_sweep(&self, now: DateTime<Utc>) -> DomainResult<PollSweepReport> {
        let cutoff = now - self.config.poll_interval;
        let due = self
            .repos
            .payments()
            .find_due_for_poll(cutoff, self.config.max_attempts, self.config.batch_size)
            .await?;

        let mut report = PollSweepReport::default();
        for payment in due {
            if payment.last_polled_at.is_some_and(|at| at > cutoff) {
                continue;
            }
            report.polled += 1;
            match self.reconciliation.on_poll_tick(&payment).await {
                Ok(ReconcileOutcome::Applied(status)) => {
                    report.applied += 1;
                    debug!(order_id = %payment.order_id, %status, "Poll applied remote status");
                }
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(order_id = %payment.order_id, error = %e, "Payment poll failed");
                }
            }
        }

        if report.polled > 0 {
            info!(
                polled = report.polled,
                applied = report.applied,
                failed = report.failed,
                "Payment poll sweep finished"
            );
        }
        Ok(report)
    }
}

/// Start the payment poll background task.
pub fn start_payment_poll_task(
    poller: Arc<PaymentPoller>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(check_interval = check_interval_secs, "Payment poll task started");

        let mut interval = tokio::time::interval(TickInterval::from_secs(check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = poller.poll_sweep(Utc::now()).await {
                        warn!(error = %e, "Payment poll sweep error");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Payment poll task shutting down");
                    break;
                }
            }
        }

        info!("Payment poll task stopped");
    })
}
