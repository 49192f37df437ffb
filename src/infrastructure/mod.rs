//! Infrastructure layer - external concerns

pub mod database;
pub mod gateway;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use gateway::MidtransGateway;
pub use storage::InMemoryRepositoryProvider;
