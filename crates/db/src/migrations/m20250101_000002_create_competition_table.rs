//! Create competition and `competition_participant` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Competition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Competition::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Competition::Kind).string_len(20).not_null())
                    .col(ColumnDef::new(Competition::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Competition::ContentType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Competition::PromptId).string_len(32).not_null())
                    .col(ColumnDef::new(Competition::Status).string_len(20).not_null())
                    .col(ColumnDef::new(Competition::CreatorId).string_len(32).not_null())
                    .col(ColumnDef::new(Competition::Participant1Id).string_len(32))
                    .col(ColumnDef::new(Competition::Participant2Id).string_len(32))
                    .col(ColumnDef::new(Competition::WinnerId).string_len(32))
                    .col(
                        ColumnDef::new(Competition::Participant1Votes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Competition::Participant2Votes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Competition::TotalVotes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Competition::SkillTier)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Competition::SubmissionHours)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Competition::VotingHours).integer().not_null())
                    .col(
                        ColumnDef::new(Competition::MaxWinners)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Competition::SubmissionDeadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Competition::VotingDeadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Competition::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Competition::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Competition::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Competition::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_competition_prompt")
                            .from(Competition::Table, Competition::PromptId)
                            .to(Prompt::Table, Prompt::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Matchmaking lookup: pending queue competitions by prompt and tier
        manager
            .create_index(
                Index::create()
                    .name("idx_competition_matchmaking")
                    .table(Competition::Table)
                    .col(Competition::Status)
                    .col(Competition::Kind)
                    .col(Competition::ContentType)
                    .col(Competition::PromptId)
                    .col(Competition::SkillTier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_competition_participant1")
                    .table(Competition::Table)
                    .col(Competition::Participant1Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_competition_participant2")
                    .table(Competition::Table)
                    .col(Competition::Participant2Id)
                    .to_owned(),
            )
            .await?;

        // Deadline sweeps
        manager
            .create_index(
                Index::create()
                    .name("idx_competition_status_submission_deadline")
                    .table(Competition::Table)
                    .col(Competition::Status)
                    .col(Competition::SubmissionDeadline)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_competition_status_voting_deadline")
                    .table(Competition::Table)
                    .col(Competition::Status)
                    .col(Competition::VotingDeadline)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CompetitionParticipant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CompetitionParticipant::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CompetitionParticipant::CompetitionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionParticipant::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionParticipant::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_competition_participant_competition")
                            .from(
                                CompetitionParticipant::Table,
                                CompetitionParticipant::CompetitionId,
                            )
                            .to(Competition::Table, Competition::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_competition_participant_unique")
                    .table(CompetitionParticipant::Table)
                    .col(CompetitionParticipant::CompetitionId)
                    .col(CompetitionParticipant::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CompetitionParticipant::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Competition::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Competition {
    Table,
    Id,
    Kind,
    Title,
    ContentType,
    PromptId,
    Status,
    CreatorId,
    #[iden = "participant1_id"]
    Participant1Id,
    #[iden = "participant2_id"]
    Participant2Id,
    WinnerId,
    #[iden = "participant1_votes"]
    Participant1Votes,
    #[iden = "participant2_votes"]
    Participant2Votes,
    TotalVotes,
    SkillTier,
    SubmissionHours,
    VotingHours,
    MaxWinners,
    SubmissionDeadline,
    VotingDeadline,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CompetitionParticipant {
    Table,
    Id,
    CompetitionId,
    UserId,
    JoinedAt,
}

#[derive(Iden)]
enum Prompt {
    Table,
    Id,
}
