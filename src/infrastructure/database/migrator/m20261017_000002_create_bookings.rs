//! Create bookings table

use sea_orm_migration::prelude::*;

use super::m20261017_000001_create_schedule_occurrences::ScheduleOccurrences;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Bookings::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Bookings::OccurrenceId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(Bookings::TotalAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Bookings::StatusReason).string())
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bookings_occurrence")
                            .from(Bookings::Table, Bookings::OccurrenceId)
                            .to(ScheduleOccurrences::Table, ScheduleOccurrences::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Expiry sweep scans PENDING rows by deadline
        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_status_expires")
                    .table(Bookings::Table)
                    .col(Bookings::Status)
                    .col(Bookings::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_occurrence")
                    .table(Bookings::Table)
                    .col(Bookings::OccurrenceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Bookings {
    Table,
    Id,
    Code,
    OccurrenceId,
    Status,
    TotalAmount,
    CreatedBy,
    StatusReason,
    CreatedAt,
    ExpiresAt,
    UpdatedAt,
}
