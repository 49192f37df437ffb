//! Domain events
//!
//! Event types that represent facts about what happened in the system.
//! The EventBus implementation lives in `application::events`.

pub mod types;

// Re-export all event types
pub use types::{
    BookingCancelledEvent, BookingConfirmedEvent, BookingCreatedEvent, BookingExpiredEvent,
    BookingRefundedEvent, Event, EventMessage, PaymentFailedEvent, PaymentRefundedEvent,
    PaymentSucceededEvent, ScheduleChangedEvent,
};
