//! Create schedule_occurrences table
//!
//! One row per sailing. Capacity counters live on the row and are only
//! written through a version-checked update.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn counter(col: ScheduleOccurrences) -> ColumnDef {
    ColumnDef::new(col).integer().not_null().default(0).to_owned()
}

fn fare(col: ScheduleOccurrences) -> ColumnDef {
    ColumnDef::new(col).big_integer().not_null().default(0).to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduleOccurrences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduleOccurrences::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduleOccurrences::ScheduleId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleOccurrences::SailingDate)
                            .date()
                            .not_null(),
                    )
                    .col(&mut counter(ScheduleOccurrences::UsedPassenger))
                    .col(&mut counter(ScheduleOccurrences::UsedMotorcycle))
                    .col(&mut counter(ScheduleOccurrences::UsedCar))
                    .col(&mut counter(ScheduleOccurrences::UsedBus))
                    .col(&mut counter(ScheduleOccurrences::UsedTruck))
                    .col(&mut counter(ScheduleOccurrences::MaxPassenger))
                    .col(&mut counter(ScheduleOccurrences::MaxMotorcycle))
                    .col(&mut counter(ScheduleOccurrences::MaxCar))
                    .col(&mut counter(ScheduleOccurrences::MaxBus))
                    .col(&mut counter(ScheduleOccurrences::MaxTruck))
                    .col(&mut fare(ScheduleOccurrences::FarePassenger))
                    .col(&mut fare(ScheduleOccurrences::FareMotorcycle))
                    .col(&mut fare(ScheduleOccurrences::FareCar))
                    .col(&mut fare(ScheduleOccurrences::FareBus))
                    .col(&mut fare(ScheduleOccurrences::FareTruck))
                    .col(
                        ColumnDef::new(ScheduleOccurrences::Status)
                            .string()
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(ColumnDef::new(ScheduleOccurrences::StatusReason).string())
                    .col(ColumnDef::new(ScheduleOccurrences::StatusExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScheduleOccurrences::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduleOccurrences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_schedule_occurrences_schedule_date")
                    .table(ScheduleOccurrences::Table)
                    .col(ScheduleOccurrences::ScheduleId)
                    .col(ScheduleOccurrences::SailingDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_schedule_occurrences_status")
                    .table(ScheduleOccurrences::Table)
                    .col(ScheduleOccurrences::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduleOccurrences::Table).to_owned())
            .await
    }
}

#[derive(Iden, Clone, Copy)]
pub enum ScheduleOccurrences {
    Table,
    Id,
    ScheduleId,
    SailingDate,
    UsedPassenger,
    UsedMotorcycle,
    UsedCar,
    UsedBus,
    UsedTruck,
    MaxPassenger,
    MaxMotorcycle,
    MaxCar,
    MaxBus,
    MaxTruck,
    FarePassenger,
    FareMotorcycle,
    FareCar,
    FareBus,
    FareTruck,
    Status,
    StatusReason,
    StatusExpiresAt,
    Version,
    UpdatedAt,
}
