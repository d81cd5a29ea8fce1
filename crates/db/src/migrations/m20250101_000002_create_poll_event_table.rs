//! Create poll_event table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollEvent::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PollEvent::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(PollEvent::PollId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PollEvent::Start)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollEvent::End)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollEvent::Note).text())
                    .col(
                        ColumnDef::new(PollEvent::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_event_poll")
                            .from(PollEvent::Table, PollEvent::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, start) for listing a poll's events in order
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_event_poll_id_start")
                    .table(PollEvent::Table)
                    .col(PollEvent::PollId)
                    .col(PollEvent::Start)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollEvent::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollEvent {
    Table,
    Id,
    PollId,
    Start,
    End,
    Note,
    CreatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}
