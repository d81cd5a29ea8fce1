//! Create participant table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Participant::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Participant::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Participant::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(Participant::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Participant::Mail).string_len(256))
                    .col(ColumnDef::new(Participant::Token).string_len(128).not_null())
                    .col(ColumnDef::new(Participant::Participation).json_binary().not_null().default("[]"))
                    .col(ColumnDef::new(Participant::IndeterminateParticipation).json_binary().not_null().default("[]"))
                    .col(
                        ColumnDef::new(Participant::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Participant::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_participant_poll")
                            .from(Participant::Table, Participant::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: poll_id (for listing a poll's participants)
        manager
            .create_index(
                Index::create()
                    .name("idx_participant_poll_id")
                    .table(Participant::Table)
                    .col(Participant::PollId)
                    .to_owned(),
            )
            .await?;

        // Index: token (participated polls, mail updates)
        manager
            .create_index(
                Index::create()
                    .name("idx_participant_token")
                    .table(Participant::Table)
                    .col(Participant::Token)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Participant::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Participant {
    Table,
    Id,
    PollId,
    Name,
    Mail,
    Token,
    Participation,
    IndeterminateParticipation,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}
