//! Create `user_competition_stats` and `reward_grant` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserCompetitionStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserCompetitionStats::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::Points)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::Wins)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::Losses)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::Draws)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::CurrentStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::BestStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::VotesCast)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserCompetitionStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RewardGrant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RewardGrant::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RewardGrant::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(RewardGrant::CompetitionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RewardGrant::Reason).string_len(32).not_null())
                    .col(ColumnDef::new(RewardGrant::Points).big_integer().not_null())
                    .col(
                        ColumnDef::new(RewardGrant::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reward_grant_competition")
                            .from(RewardGrant::Table, RewardGrant::CompetitionId)
                            .to(Competition::Table, Competition::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reward_grant_unique")
                    .table(RewardGrant::Table)
                    .col(RewardGrant::UserId)
                    .col(RewardGrant::CompetitionId)
                    .col(RewardGrant::Reason)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RewardGrant::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserCompetitionStats::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserCompetitionStats {
    Table,
    UserId,
    Points,
    Wins,
    Losses,
    Draws,
    CurrentStreak,
    BestStreak,
    VotesCast,
    UpdatedAt,
}

#[derive(Iden)]
enum RewardGrant {
    Table,
    Id,
    UserId,
    CompetitionId,
    Reason,
    Points,
    CreatedAt,
}

#[derive(Iden)]
enum Competition {
    Table,
    Id,
}
