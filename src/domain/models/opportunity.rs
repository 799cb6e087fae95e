// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 交易场所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// 中心化交易所
    Binance,
    /// 去中心化交易所
    Uniswap,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Venue::Binance => write!(f, "binance"),
            Venue::Uniswap => write!(f, "uniswap"),
        }
    }
}

/// 对齐后的价格样本
///
/// 以链上成交时刻为锚点，对手交易所价格取
/// [block_time - delay - window, block_time - delay + window]
/// 区间内的均值。任一侧缺价时cex_price为None。
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    /// 链上成交时刻（锚点）
    pub block_time: DateTime<FixedOffset>,
    /// 链上成交价格
    pub dex_price: f64,
    /// 链上成交时的gas价格（wei）
    pub gas_price: f64,
    /// 对手交易所窗口均价
    pub cex_price: Option<f64>,
    /// 对手交易所窗口内成交量
    pub cex_volume: f64,
}

/// 套利机会
///
/// 两个场所价差产生的单向机会，方向互斥：同一价格样本
/// 最多产生一条记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// 机会出现的时刻（锚点时刻）
    pub block_time: DateTime<FixedOffset>,
    /// 买入场所（价格较低一侧）
    pub buy_venue: Venue,
    /// 卖出场所（价格较高一侧）
    pub sell_venue: Venue,
    /// 买入价
    pub buy_price: f64,
    /// 卖出价
    pub sell_price: f64,
    /// 扣除手续费和gas后的净利润（USDT）
    pub profit: f64,
    /// 风险指标
    pub risk: RiskMetrics,
}

/// 风险评估指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// 对手场所价格的滚动波动率（stddev / mean）
    pub volatility: f64,
    /// 估算的滑点比例，上限1.0
    pub slippage: f64,
    /// 滑点成本（USDT）
    pub slippage_cost: f64,
    /// 风险调整评分，[0, 100]
    pub risk_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_display() {
        assert_eq!(Venue::Binance.to_string(), "binance");
        assert_eq!(Venue::Uniswap.to_string(), "uniswap");
    }

    #[test]
    fn test_venue_serde() {
        assert_eq!(
            serde_json::to_string(&Venue::Uniswap).unwrap(),
            "\"uniswap\""
        );
        let venue: Venue = serde_json::from_str("\"binance\"").unwrap();
        assert_eq!(venue, Venue::Binance);
    }
}
