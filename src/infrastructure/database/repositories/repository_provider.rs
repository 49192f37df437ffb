//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::{
    BookingRepository, PaymentRepository, RefundRepository, RepositoryProvider, ScheduleRepository,
};

use super::booking_repository::SeaOrmBookingRepository;
use super::payment_repository::{SeaOrmPaymentRepository, SeaOrmRefundRepository};
use super::schedule_repository::SeaOrmScheduleRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let occ = repos.schedules().find_by_id(12).await?;
/// let booking = repos.bookings().find_by_code("FRY-261017-K3Q9ZD").await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    schedules: SeaOrmScheduleRepository,
    bookings: SeaOrmBookingRepository,
    payments: SeaOrmPaymentRepository,
    refunds: SeaOrmRefundRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            schedules: SeaOrmScheduleRepository::new(db.clone()),
            bookings: SeaOrmBookingRepository::new(db.clone()),
            payments: SeaOrmPaymentRepository::new(db.clone()),
            refunds: SeaOrmRefundRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn schedules(&self) -> &dyn ScheduleRepository {
        &self.schedules
    }

    fn bookings(&self) -> &dyn BookingRepository {
        &self.bookings
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn refunds(&self) -> &dyn RefundRepository {
        &self.refunds
    }
}
