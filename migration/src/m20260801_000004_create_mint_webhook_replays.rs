use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MintWebhookReplays::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MintWebhookReplays::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MintWebhookReplays::ReplayKey)
                            .string_len(160)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(MintWebhookReplays::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintWebhookReplays::CreatedAt)
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
                    .name("idx_mint_webhook_replays_expires_at")
                    .table(MintWebhookReplays::Table)
                    .col(MintWebhookReplays::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MintWebhookReplays::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MintWebhookReplays {
    Table,
    Id,
    ReplayKey,
    ExpiresAt,
    CreatedAt,
}
