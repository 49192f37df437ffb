//! Application ports (hexagonal architecture boundaries)
//!
//! Outbound ports that the application services call through.

pub mod gateway;

pub use gateway::{PaymentGateway, SharedPaymentGateway};
