//! Booking aggregate
//!
//! Contains the Booking entity, its line items, and repository interface.

pub mod model;
pub mod repository;

pub use model::{counts_for, generate_booking_code, Booking, BookingItem, BookingStatus};
pub use repository::BookingRepository;
