// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod aggregated_price;
pub mod arbitrage_opportunity;
pub mod binance_trade;
pub mod task;
pub mod task_log;
pub mod uniswap_swap;
