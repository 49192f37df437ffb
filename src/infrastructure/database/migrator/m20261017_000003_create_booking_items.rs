//! Create booking_items table

use sea_orm_migration::prelude::*;

use super::m20261017_000002_create_bookings::Bookings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BookingItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BookingItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BookingItems::BookingId).string().not_null())
                    .col(ColumnDef::new(BookingItems::Position).integer().not_null())
                    .col(ColumnDef::new(BookingItems::Category).string().not_null())
                    .col(ColumnDef::new(BookingItems::Label).string().not_null())
                    .col(ColumnDef::new(BookingItems::Fare).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_items_booking")
                            .from(BookingItems::Table, BookingItems::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_items_booking")
                    .table(BookingItems::Table)
                    .col(BookingItems::BookingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookingItems::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BookingItems {
    Table,
    Id,
    BookingId,
    Position,
    Category,
    Label,
    Fare,
}
