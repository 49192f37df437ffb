//! Payment aggregate
//!
//! Payment attempts, refunds and the gateway-facing status types.

pub mod model;
pub mod repository;

pub use model::{
    Payment, PaymentSession, PaymentStatus, Refund, RemoteStatus, RemoteTransaction,
    TransitionPlan, VerifiedNotification,
};
pub use repository::{PaymentRepository, RefundRepository};
