//! Migration to create the tokens table.
//!
//! Besides the unique secret value, a partial unique index on `company_id`
//! restricted to active rows keeps at most one active token per company.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const ONE_ACTIVE_TOKEN_INDEX: &str = "idx_tokens_one_active_per_company";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tokens::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tokens::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tokens::Token).text().not_null())
                    .col(ColumnDef::new(Tokens::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Tokens::RepositoryId).text().null())
                    .col(
                        ColumnDef::new(Tokens::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Tokens::PaymentStatus)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Tokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tokens::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tokens_company_id")
                            .from(Tokens::Table, Tokens::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tokens_token")
                    .table(Tokens::Table)
                    .col(Tokens::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tokens_company_id")
                    .table(Tokens::Table)
                    .col(Tokens::CompanyId)
                    .to_owned(),
            )
            .await?;

        // Partial indexes are not expressible through the index builder; both
        // Postgres and SQLite accept this form.
        manager
            .get_connection()
            .execute_unprepared(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {ONE_ACTIVE_TOKEN_INDEX} ON tokens (company_id) WHERE is_active"
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(ONE_ACTIVE_TOKEN_INDEX).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_tokens_company_id").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_tokens_token").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tokens {
    Table,
    Id,
    Token,
    CompanyId,
    RepositoryId,
    IsActive,
    PaymentStatus,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}
