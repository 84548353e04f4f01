//! Create prompt table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prompt::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prompt::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prompt::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Prompt::Description).text().not_null())
                    .col(ColumnDef::new(Prompt::ContentType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Prompt::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Prompt::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_prompt_content_type_active")
                    .table(Prompt::Table)
                    .col(Prompt::ContentType)
                    .col(Prompt::IsActive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Prompt::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Prompt {
    Table,
    Id,
    Title,
    Description,
    ContentType,
    IsActive,
    CreatedAt,
}
