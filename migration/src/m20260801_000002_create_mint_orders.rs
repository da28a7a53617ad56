use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MintOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MintOrders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MintOrders::OrderNo)
                            .string_len(40)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(MintOrders::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(MintOrders::CharacterId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintOrders::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(MintOrders::ChainId).big_integer().not_null())
                    .col(
                        ColumnDef::new(MintOrders::TokenAddress)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintOrders::TokenSymbol)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintOrders::TokenAmount)
                            .string_len(80)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MintOrders::TokenAmountWei)
                            .string_len(120)
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(MintOrders::TreasuryWallet)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MintOrders::TxHash).string_len(80))
                    .col(ColumnDef::new(MintOrders::PayerWallet).string_len(42))
                    .col(ColumnDef::new(MintOrders::BlockNumber).big_integer())
                    .col(ColumnDef::new(MintOrders::VerifiedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MintOrders::FailReason).text())
                    .col(
                        ColumnDef::new(MintOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MintOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // A tx hash can confirm at most one order. Postgres treats NULLs as
        // distinct, so unattached orders do not collide.
        manager
            .create_index(
                Index::create()
                    .name("idx_mint_orders_tx_hash")
                    .table(MintOrders::Table)
                    .col(MintOrders::TxHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mint_orders_user_character")
                    .table(MintOrders::Table)
                    .col(MintOrders::UserId)
                    .col(MintOrders::CharacterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mint_orders_status")
                    .table(MintOrders::Table)
                    .col(MintOrders::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MintOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MintOrders {
    Table,
    Id,
    OrderNo,
    UserId,
    CharacterId,
    Status,
    ChainId,
    TokenAddress,
    TokenSymbol,
    TokenAmount,
    TokenAmountWei,
    TreasuryWallet,
    TxHash,
    PayerWallet,
    BlockNumber,
    VerifiedAt,
    FailReason,
    CreatedAt,
    UpdatedAt,
}
