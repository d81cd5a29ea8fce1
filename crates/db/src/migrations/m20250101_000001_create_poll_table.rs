//! Create poll table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Poll::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Poll::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Poll::Description).text())
                    .col(ColumnDef::new(Poll::Location).string_len(512))
                    .col(ColumnDef::new(Poll::TimeZone).string_len(64))
                    .col(ColumnDef::new(Poll::AdminToken).string_len(128).not_null())
                    .col(ColumnDef::new(Poll::AdminMail).string_len(256))
                    .col(ColumnDef::new(Poll::AdminPush).json_binary())
                    .col(ColumnDef::new(Poll::Deadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Poll::AllowMaybe).boolean().not_null().default(true))
                    .col(ColumnDef::new(Poll::AllowEdit).boolean().not_null().default(true))
                    .col(ColumnDef::new(Poll::Anonymous).boolean().not_null().default(false))
                    .col(ColumnDef::new(Poll::BookedEvents).json_binary().not_null().default("[]"))
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Poll::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: admin_token (for listing an admin's polls)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_admin_token")
                    .table(Poll::Table)
                    .col(Poll::AdminToken)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (newest first listing)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_created_at")
                    .table(Poll::Table)
                    .col(Poll::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Title,
    Description,
    Location,
    TimeZone,
    AdminToken,
    AdminMail,
    AdminPush,
    Deadline,
    AllowMaybe,
    AllowEdit,
    Anonymous,
    BookedEvents,
    CreatedAt,
    UpdatedAt,
}
