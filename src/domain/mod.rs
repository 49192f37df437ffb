//! Domain layer: entities, state rules and repository traits

pub mod actor;
pub mod booking;
pub mod events;
pub mod payment;
pub mod repositories;
pub mod schedule;

// Re-export commonly used types
pub use actor::{Actor, ActorRole};
pub use booking::{Booking, BookingItem, BookingRepository, BookingStatus};
pub use events::{Event, EventMessage};
pub use payment::{
    Payment, PaymentRepository, PaymentSession, PaymentStatus, Refund, RefundRepository,
    RemoteStatus, RemoteTransaction, TransitionPlan, VerifiedNotification,
};
pub use repositories::{DomainResult, RepositoryProvider};
pub use schedule::{
    CapacityCategory, CapacityCounters, CategoryCounts, Fares, ScheduleOccurrence,
    ScheduleRepository, ScheduleStatus,
};

pub use crate::shared::errors::DomainError;
