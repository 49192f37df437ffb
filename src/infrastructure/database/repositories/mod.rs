//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod booking_repository;
pub mod payment_repository;
pub mod repository_provider;
pub mod schedule_repository;

pub use repository_provider::SeaOrmRepositoryProvider;
