use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MintVerifyJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MintVerifyJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // At most one active verify job per order
                    .col(
                        ColumnDef::new(MintVerifyJobs::OrderId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::TxHash)
                            .string_len(80)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::PayerWallet)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::NextRetryAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MintVerifyJobs::LastTriedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MintVerifyJobs::LastError).text())
                    .col(
                        ColumnDef::new(MintVerifyJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MintVerifyJobs::UpdatedAt)
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
                    .name("idx_mint_verify_jobs_status")
                    .table(MintVerifyJobs::Table)
                    .col(MintVerifyJobs::Status)
                    .to_owned(),
            )
            .await?;

        // Claim scans filter on (status, next_retry_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_mint_verify_jobs_next_retry_at")
                    .table(MintVerifyJobs::Table)
                    .col(MintVerifyJobs::NextRetryAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MintVerifyJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MintVerifyJobs {
    Table,
    Id,
    OrderId,
    TxHash,
    PayerWallet,
    Status,
    AttemptCount,
    MaxAttempts,
    NextRetryAt,
    LastTriedAt,
    LastError,
    CreatedAt,
    UpdatedAt,
}
