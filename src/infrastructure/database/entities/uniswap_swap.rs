// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "uniswap_swaps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub block_time: ChronoDateTimeWithTimeZone,
    pub price: f64,
    pub amount0: f64,
    pub amount1: f64,
    pub gas_price: f64,
    pub tx_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
