//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::booking::BookingRepository;
use super::payment::{PaymentRepository, RefundRepository};
use super::schedule::ScheduleRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let booking = repos.bookings().find_by_code("FRY-261017-K3Q9ZD").await?;
///     let payment = repos.payments().find_by_order_id("FRY-261017-K3Q9ZD").await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn schedules(&self) -> &dyn ScheduleRepository;
    fn bookings(&self) -> &dyn BookingRepository;
    fn payments(&self) -> &dyn PaymentRepository;
    fn refunds(&self) -> &dyn RefundRepository;
}
