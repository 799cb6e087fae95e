use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ArbitrageOpportunities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::BatchId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::BlockTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::BuyVenue)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::SellVenue)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::BuyPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::SellPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ArbitrageOpportunities::Profit)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ArbitrageOpportunities::Details).json_binary())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_arbitrage_opportunities_batch_id")
                    .table(ArbitrageOpportunities::Table)
                    .col(ArbitrageOpportunities::BatchId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ArbitrageOpportunities::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ArbitrageOpportunities {
    Table,
    Id,
    BatchId,
    BlockTime,
    BuyVenue,
    SellVenue,
    BuyPrice,
    SellPrice,
    Profit,
    Details,
}
