//! Create `competition_entry` and `competition_vote` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CompetitionEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CompetitionEntry::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CompetitionEntry::CompetitionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionEntry::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionEntry::Title)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CompetitionEntry::Description).text())
                    .col(ColumnDef::new(CompetitionEntry::MediaUrl).string_len(512))
                    .col(
                        ColumnDef::new(CompetitionEntry::VoteCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CompetitionEntry::SubmittedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CompetitionEntry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CompetitionEntry::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_competition_entry_competition")
                            .from(CompetitionEntry::Table, CompetitionEntry::CompetitionId)
                            .to(Competition::Table, Competition::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One entry per participant per competition
        manager
            .create_index(
                Index::create()
                    .name("idx_competition_entry_unique")
                    .table(CompetitionEntry::Table)
                    .col(CompetitionEntry::CompetitionId)
                    .col(CompetitionEntry::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CompetitionVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CompetitionVote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CompetitionVote::CompetitionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionVote::VoterId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionVote::EntryId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_competition_vote_competition")
                            .from(CompetitionVote::Table, CompetitionVote::CompetitionId)
                            .to(Competition::Table, Competition::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_competition_vote_entry")
                            .from(CompetitionVote::Table, CompetitionVote::EntryId)
                            .to(CompetitionEntry::Table, CompetitionEntry::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One vote per voter per competition; the insert itself is the duplicate check
        manager
            .create_index(
                Index::create()
                    .name("idx_competition_vote_unique")
                    .table(CompetitionVote::Table)
                    .col(CompetitionVote::CompetitionId)
                    .col(CompetitionVote::VoterId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_competition_vote_entry_id")
                    .table(CompetitionVote::Table)
                    .col(CompetitionVote::EntryId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CompetitionVote::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CompetitionEntry::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CompetitionEntry {
    Table,
    Id,
    CompetitionId,
    UserId,
    Title,
    Description,
    MediaUrl,
    VoteCount,
    SubmittedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CompetitionVote {
    Table,
    Id,
    CompetitionId,
    VoterId,
    EntryId,
    CreatedAt,
}

#[derive(Iden)]
enum Competition {
    Table,
    Id,
}
