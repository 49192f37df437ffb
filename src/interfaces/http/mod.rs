//! HTTP REST API
//!
//! - `common`: response envelope, error mapping, actor and JSON extractors
//! - `modules`: per-resource DTOs and handlers
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod modules;
pub mod router;

pub use common::{ApiError, ApiResponse, ValidatedJson};
pub use router::{create_api_router, ApiServices};
