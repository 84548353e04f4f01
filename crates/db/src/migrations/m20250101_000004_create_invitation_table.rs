//! Create `competition_invitation` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CompetitionInvitation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CompetitionInvitation::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::CompetitionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::InviteeId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::InviterId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::Slot)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(CompetitionInvitation::Message).text())
                    .col(
                        ColumnDef::new(CompetitionInvitation::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::RespondedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CompetitionInvitation::UpdatedAt)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_competition_invitation_competition")
                            .from(
                                CompetitionInvitation::Table,
                                CompetitionInvitation::CompetitionId,
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
                    .name("idx_competition_invitation_invitee_id")
                    .table(CompetitionInvitation::Table)
                    .col(CompetitionInvitation::InviteeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_competition_invitation_status_expires_at")
                    .table(CompetitionInvitation::Table)
                    .col(CompetitionInvitation::Status)
                    .col(CompetitionInvitation::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // At most one live (pending or accepted) invitation per slot
        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_competition_invitation_live_slot
                ON competition_invitation (competition_id, slot)
                WHERE status IN ('pending', 'accepted');
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CompetitionInvitation::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CompetitionInvitation {
    Table,
    Id,
    CompetitionId,
    InviteeId,
    InviterId,
    Slot,
    Status,
    Message,
    ExpiresAt,
    RespondedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Competition {
    Table,
    Id,
}
