// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::opportunity::RiskMetrics;
use std::collections::VecDeque;

/// 滚动风险上下文
///
/// 沿时间轴逐点喂入锚点场所的价格和对手交易所的成交量，
/// 价格序列驱动波动率，成交量作为市场容量的代理，
/// 供每个候选机会评估。
pub struct RiskContext {
    window: usize,
    impact_constant: f64,
    prices: VecDeque<f64>,
    volumes: VecDeque<f64>,
}

impl RiskContext {
    /// 创建新的风险上下文
    ///
    /// # 参数
    ///
    /// * `window` - 滚动样本窗口大小
    /// * `impact_constant` - 冲击成本系数
    pub fn new(window: usize, impact_constant: f64) -> Self {
        Self {
            window: window.max(1),
            impact_constant,
            prices: VecDeque::new(),
            volumes: VecDeque::new(),
        }
    }

    /// 记录一个价格样本
    pub fn observe(&mut self, price: f64, volume: f64) {
        self.prices.push_back(price);
        self.volumes.push_back(volume.max(0.0));
        if self.prices.len() > self.window {
            self.prices.pop_front();
            self.volumes.pop_front();
        }
    }

    /// 窗口内波动率（标准差除以均值）
    ///
    /// 样本不足两个或均值为零时返回0。
    pub fn volatility(&self) -> f64 {
        let n = self.prices.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.prices.iter().sum::<f64>() / n as f64;
        if mean == 0.0 {
            return 0.0;
        }
        let variance =
            self.prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt() / mean
    }

    /// 窗口内累计成交量
    pub fn market_volume(&self) -> f64 {
        self.volumes.iter().sum()
    }

    /// 评估一个候选机会的风险
    ///
    /// # 参数
    ///
    /// * `profit` - 候选机会的净利润（USDT）
    /// * `investment` - 投入金额（USDT）
    /// * `trade_size_eth` - 买入侧换得的ETH数量
    pub fn assess(&self, profit: f64, investment: f64, trade_size_eth: f64) -> RiskMetrics {
        let volatility = self.volatility();
        let slippage = slippage_ratio(
            volatility,
            trade_size_eth,
            self.market_volume(),
            self.impact_constant,
        );
        let slippage_cost = investment * slippage;
        RiskMetrics {
            volatility,
            slippage,
            slippage_cost,
            risk_score: risk_score(profit, slippage_cost),
        }
    }
}

/// 估算滑点比例
///
/// 市场容量为零或负时按全额滑点处理，结果上限为1.0。
pub fn slippage_ratio(
    volatility: f64,
    trade_size_eth: f64,
    market_volume: f64,
    impact_constant: f64,
) -> f64 {
    if market_volume <= 0.0 {
        return 1.0;
    }
    let ratio = impact_constant * volatility * (trade_size_eth / market_volume).sqrt();
    ratio.min(1.0)
}

/// 风险调整评分
///
/// 100 * (profit - cost) / profit，截断到[0, 100]。
/// 利润不为正时评分为0。
pub fn risk_score(profit: f64, cost: f64) -> f64 {
    if profit <= 0.0 {
        return 0.0;
    }
    (100.0 * (profit - cost) / profit).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_market_volume_full_slippage() {
        // Given: 窗口内没有任何成交量
        assert_eq!(slippage_ratio(0.5, 10.0, 0.0, 2.0), 1.0);
        assert_eq!(slippage_ratio(0.5, 10.0, -1.0, 2.0), 1.0);
    }

    #[test]
    fn test_slippage_capped_at_one() {
        // Given: 波动和交易规模都极大
        assert_eq!(slippage_ratio(10.0, 1_000_000.0, 1.0, 2.0), 1.0);
    }

    #[test]
    fn test_risk_score_bounds() {
        assert_eq!(risk_score(-5.0, 1.0), 0.0);
        assert_eq!(risk_score(0.0, 1.0), 0.0);
        assert_eq!(risk_score(100.0, 0.0), 100.0);
        assert_eq!(risk_score(100.0, 50.0), 50.0);
        // 成本超过利润时截断到0
        assert_eq!(risk_score(100.0, 200.0), 0.0);
    }

    #[test]
    fn test_volatility_constant_series_is_zero() {
        let mut ctx = RiskContext::new(20, 2.0);
        for _ in 0..10 {
            ctx.observe(3000.0, 5.0);
        }
        assert_eq!(ctx.volatility(), 0.0);
        assert_eq!(ctx.market_volume(), 50.0);
    }

    #[test]
    fn test_volatility_needs_two_samples() {
        let mut ctx = RiskContext::new(20, 2.0);
        assert_eq!(ctx.volatility(), 0.0);
        ctx.observe(3000.0, 1.0);
        assert_eq!(ctx.volatility(), 0.0);
        ctx.observe(3100.0, 1.0);
        assert!(ctx.volatility() > 0.0);
    }

    #[test]
    fn test_window_evicts_old_samples() {
        let mut ctx = RiskContext::new(3, 2.0);
        for volume in [1.0, 2.0, 3.0, 4.0] {
            ctx.observe(3000.0, volume);
        }
        // 窗口为3，最早的样本被逐出
        assert_eq!(ctx.market_volume(), 9.0);
    }

    #[test]
    fn test_assess_combines_metrics() {
        let mut ctx = RiskContext::new(20, 2.0);
        ctx.observe(2900.0, 100.0);
        ctx.observe(3100.0, 100.0);

        let metrics = ctx.assess(1000.0, 100_000.0, 30.0);
        assert!(metrics.volatility > 0.0);
        assert!(metrics.slippage > 0.0 && metrics.slippage <= 1.0);
        assert_eq!(metrics.slippage_cost, 100_000.0 * metrics.slippage);
        assert!(metrics.risk_score >= 0.0 && metrics.risk_score <= 100.0);
    }
}
