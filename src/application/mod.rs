//! Application layer: use cases over the domain

pub mod events;
pub mod ports;
pub mod services;

// Re-export key types for convenience
pub use events::{create_event_bus, Event, EventBus, EventSubscriber, SharedEventBus};
pub use ports::{PaymentGateway, SharedPaymentGateway};
pub use services::{
    BookingPolicy, BookingService, CapacityLedger, ExpirySweeper, PaymentPoller, PollerConfig,
    ReconcileOutcome, ReconciliationPolicy, ReconciliationService, ScheduleService,
};
