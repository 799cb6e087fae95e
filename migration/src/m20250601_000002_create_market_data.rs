use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create binance_trades table (counter venue price stream)
        manager
            .create_table(
                Table::create()
                    .table(BinanceTrades::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BinanceTrades::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BinanceTrades::Price).double().not_null())
                    .col(ColumnDef::new(BinanceTrades::Qty).double().not_null())
                    .col(ColumnDef::new(BinanceTrades::QuoteQty).double().not_null())
                    .col(
                        ColumnDef::new(BinanceTrades::TradeTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BinanceTrades::IsBuyerMaker)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BinanceTrades::IsBestMatch)
                            .boolean()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_binance_trades_trade_time")
                    .table(BinanceTrades::Table)
                    .col(BinanceTrades::TradeTime)
                    .to_owned(),
            )
            .await?;

        // Create uniswap_swaps table (anchor venue price stream)
        manager
            .create_table(
                Table::create()
                    .table(UniswapSwaps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UniswapSwaps::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UniswapSwaps::BlockTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UniswapSwaps::Price).double().not_null())
                    .col(ColumnDef::new(UniswapSwaps::Amount0).double().not_null())
                    .col(ColumnDef::new(UniswapSwaps::Amount1).double().not_null())
                    .col(ColumnDef::new(UniswapSwaps::GasPrice).double().not_null())
                    .col(ColumnDef::new(UniswapSwaps::TxHash).string_len(128).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uniswap_swaps_block_time")
                    .table(UniswapSwaps::Table)
                    .col(UniswapSwaps::BlockTime)
                    .to_owned(),
            )
            .await?;

        // Create aggregated_prices table
        manager
            .create_table(
                Table::create()
                    .table(AggregatedPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AggregatedPrices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AggregatedPrices::TimeBucket)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AggregatedPrices::Source)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AggregatedPrices::AveragePrice)
                            .double()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_aggregated_prices_bucket_source")
                    .table(AggregatedPrices::Table)
                    .col(AggregatedPrices::TimeBucket)
                    .col(AggregatedPrices::Source)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AggregatedPrices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UniswapSwaps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BinanceTrades::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BinanceTrades {
    Table,
    Id,
    Price,
    Qty,
    QuoteQty,
    TradeTime,
    IsBuyerMaker,
    IsBestMatch,
}

#[derive(DeriveIden)]
enum UniswapSwaps {
    Table,
    Id,
    BlockTime,
    Price,
    Amount0,
    Amount1,
    GasPrice,
    TxHash,
}

#[derive(DeriveIden)]
enum AggregatedPrices {
    Table,
    Id,
    TimeBucket,
    Source,
    AveragePrice,
}
