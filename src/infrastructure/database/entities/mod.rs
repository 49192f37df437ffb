//! Database entities module

pub mod booking;
pub mod booking_item;
pub mod payment;
pub mod refund;
pub mod schedule_occurrence;

pub use booking::Entity as Booking;
pub use booking_item::Entity as BookingItem;
pub use payment::Entity as Payment;
pub use refund::Entity as Refund;
pub use schedule_occurrence::Entity as ScheduleOccurrence;
