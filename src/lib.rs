//! # Ferry Booking
//!
//! Ferry ticket booking with capacity-safe reservations and payment
//! reconciliation against Midtrans.
//!
//! ## Architecture
//!
//! - **domain**: entities, state rules and repository traits
//! - **application**: capacity ledger, booking, schedule and reconciliation
//!   services plus the background sweeps
//! - **infrastructure**: SeaORM storage, in-memory storage, Midtrans adapter
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: runtime bootstrap and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};

// Re-export API router
pub use interfaces::http::create_api_router;

pub use application::events::{create_event_bus, EventBus, SharedEventBus};
pub use domain::Event;
