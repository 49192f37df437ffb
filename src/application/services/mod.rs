//! Application services

pub mod booking;
pub mod capacity_ledger;
pub mod expiry_sweeper;
pub mod payment_poller;
pub mod reconciliation;
pub mod schedule;

#[cfg(test)]
pub(crate) mod test_support;

pub use booking::{BookingPolicy, BookingRequestItem, BookingService};
pub use capacity_ledger::{CapacityLedger, ReservationToken};
pub use expiry_sweeper::{start_expiry_sweep_task, ExpirySweeper, SweepReport};
pub use payment_poller::{start_payment_poll_task, PaymentPoller, PollSweepReport, PollerConfig};
pub use reconciliation::{
    ReconcileOutcome, ReconciliationPolicy, ReconciliationService, PAYMENT_UNAVAILABLE,
};
pub use schedule::ScheduleService;
