//! Migration to create the validation_logs table (append-only audit trail).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ValidationLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ValidationLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ValidationLogs::TokenId).uuid().not_null())
                    .col(ColumnDef::new(ValidationLogs::Payload).json_binary().not_null())
                    .col(ColumnDef::new(ValidationLogs::Result).json_binary().not_null())
                    .col(ColumnDef::new(ValidationLogs::Status).text().not_null())
                    .col(
                        ColumnDef::new(ValidationLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_validation_logs_token_id")
                            .from(ValidationLogs::Table, ValidationLogs::TokenId)
                            .to(Tokens::Table, Tokens::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_validation_logs_token_id")
                    .table(ValidationLogs::Table)
                    .col(ValidationLogs::TokenId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_validation_logs_token_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ValidationLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ValidationLogs {
    Table,
    Id,
    TokenId,
    Payload,
    Result,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tokens {
    Table,
    Id,
}
