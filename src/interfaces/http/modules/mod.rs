//! HTTP feature modules

pub mod bookings;
pub mod health;
pub mod metrics;
pub mod payments;
pub mod schedules;
