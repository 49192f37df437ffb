//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20261017_000001_create_schedule_occurrences;
mod m20261017_000002_create_bookings;
mod m20261017_000003_create_booking_items;
mod m20261017_000004_create_payments;
mod m20261017_000005_create_refunds;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261017_000001_create_schedule_occurrences::Migration),
            Box::new(m20261017_000002_create_bookings::Migration),
            Box::new(m20261017_000003_create_booking_items::Migration),
            Box::new(m20261017_000004_create_payments::Migration),
            Box::new(m20261017_000005_create_refunds::Migration),
        ]
    }
}
