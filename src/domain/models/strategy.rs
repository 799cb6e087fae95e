// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 套利分析策略参数
///
/// 所有字段均带默认值，调用方只需在任务配置中覆盖关心的参数。
/// 参数在任务入队后不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// 中心化交易所手续费率
    #[serde(default = "default_fee_rate_cex")]
    pub fee_rate_cex: f64,
    /// 去中心化交易所手续费率
    #[serde(default = "default_fee_rate_dex")]
    pub fee_rate_dex: f64,
    /// 估算的链上交易gas消耗量
    #[serde(default = "default_estimated_gas_used")]
    pub estimated_gas_used: f64,
    /// 单次套利投入金额（USDT）
    #[serde(default = "default_investment")]
    pub investment: f64,
    /// 对手交易所价格的时间滞后（秒）
    #[serde(default = "default_time_delay_seconds")]
    pub time_delay_seconds: i64,
    /// 对手交易所价格的对齐窗口半径（秒）
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
    /// 净利润阈值，严格大于该值才记录机会
    #[serde(default = "default_profit_threshold")]
    pub profit_threshold: f64,
    /// 波动率计算的滚动样本窗口大小
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
    /// 冲击成本系数
    #[serde(default = "default_impact_constant")]
    pub impact_constant: f64,
    /// 分析起始时间（RFC 3339），缺省时覆盖全部数据
    #[serde(default)]
    pub start_time: Option<String>,
    /// 分析结束时间（RFC 3339）
    #[serde(default)]
    pub end_time: Option<String>,
    /// 结果批次号，缺省时自动取下一个空闲批次
    #[serde(default)]
    pub batch_id: Option<i32>,
    /// 覆盖写入：先删除同批次的历史结果再插入
    #[serde(default)]
    pub overwrite: bool,
}

fn default_fee_rate_cex() -> f64 {
    0.001
}

fn default_fee_rate_dex() -> f64 {
    0.0005
}

fn default_estimated_gas_used() -> f64 {
    20.0
}

fn default_investment() -> f64 {
    100_000.0
}

fn default_time_delay_seconds() -> i64 {
    3
}

fn default_window_seconds() -> i64 {
    5
}

fn default_profit_threshold() -> f64 {
    10.0
}

fn default_volatility_window() -> usize {
    20
}

fn default_impact_constant() -> f64 {
    2.0
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fee_rate_cex: default_fee_rate_cex(),
            fee_rate_dex: default_fee_rate_dex(),
            estimated_gas_used: default_estimated_gas_used(),
            investment: default_investment(),
            time_delay_seconds: default_time_delay_seconds(),
            window_seconds: default_window_seconds(),
            profit_threshold: default_profit_threshold(),
            volatility_window: default_volatility_window(),
            impact_constant: default_impact_constant(),
            start_time: None,
            end_time: None,
            batch_id: None,
            overwrite: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_empty_config() {
        // Given: 空的任务配置
        let config: StrategyConfig = serde_json::from_value(json!({})).unwrap();

        // Then: 所有参数取默认值
        assert_eq!(config.fee_rate_cex, 0.001);
        assert_eq!(config.fee_rate_dex, 0.0005);
        assert_eq!(config.estimated_gas_used, 20.0);
        assert_eq!(config.investment, 100_000.0);
        assert_eq!(config.time_delay_seconds, 3);
        assert_eq!(config.window_seconds, 5);
        assert_eq!(config.profit_threshold, 10.0);
        assert_eq!(config.volatility_window, 20);
        assert_eq!(config.impact_constant, 2.0);
        assert!(config.start_time.is_none());
        assert!(config.batch_id.is_none());
        assert!(!config.overwrite);
    }

    #[test]
    fn test_partial_override() {
        // Given: 仅覆盖部分参数
        let config: StrategyConfig =
            serde_json::from_value(json!({"investment": 5000.0, "profit_threshold": 0.0}))
                .unwrap();

        assert_eq!(config.investment, 5000.0);
        assert_eq!(config.profit_threshold, 0.0);
        assert_eq!(config.fee_rate_cex, 0.001);
    }
}
