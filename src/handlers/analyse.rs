// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::opportunity::{Opportunity, PricePoint, Venue};
use crate::domain::models::strategy::StrategyConfig;
use crate::handlers::risk::RiskContext;
use crate::handlers::{HandlerError, JobContext, JobHandler};
use crate::infrastructure::database::entities::arbitrage_opportunity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait, QueryFilter, Set,
    Statement, Value,
};
use tracing::info;

const INSERT_CHUNK: usize = 500;

/// 套利分析处理器
///
/// 以链上成交为锚点对齐两个场所的价格流，逐点判定方向、
/// 计算扣费净利润并评估风险，超过阈值的机会落库。
#[derive(Default)]
pub struct AnalyseHandler;

impl AnalyseHandler {
    /// 创建新的分析处理器
    pub fn new() -> Self {
        Self
    }
}

/// 买入CEX、卖出DEX的净利润（USDT）
///
/// 投入先在CEX扣手续费换成ETH，再按DEX价格卖出，
/// 扣除DEX手续费和按ETH计的gas成本。
pub fn profit_buy_cex_sell_dex(
    cex_price: f64,
    dex_price: f64,
    gas_price_wei: f64,
    cfg: &StrategyConfig,
) -> f64 {
    let eth = cfg.investment * (1.0 - cfg.fee_rate_cex) / cex_price;
    let gross = eth * dex_price;
    let gas_cost_eth = cfg.estimated_gas_used * gas_price_wei / 1e18;
    gross - gross * cfg.fee_rate_dex - cfg.investment - gas_cost_eth * dex_price
}

/// 买入DEX、卖出CEX的净利润（USDT）
pub fn profit_buy_dex_sell_cex(
    cex_price: f64,
    dex_price: f64,
    gas_price_wei: f64,
    cfg: &StrategyConfig,
) -> f64 {
    let eth = (cfg.investment - cfg.investment * cfg.fee_rate_dex) / dex_price;
    let gross = eth * cex_price;
    let gas_cost_usdt = cfg.estimated_gas_used * gas_price_wei / 1e18 * dex_price;
    gross - gross * cfg.fee_rate_cex - cfg.investment - gas_cost_usdt
}

/// 在对齐后的价格序列上检出套利机会
///
/// 每个价格样本最多产生一条记录，方向互斥：价格相等时
/// 无机会。缺失或非法的价格样本直接跳过，不参与检出，
/// 但合法样本无论是否产生机会都进入风险窗口。
/// 净利润必须严格大于阈值才会记录。
pub fn detect_opportunities(points: &[PricePoint], cfg: &StrategyConfig) -> Vec<Opportunity> {
    let mut risk_ctx = RiskContext::new(cfg.volatility_window, cfg.impact_constant);
    let mut opportunities = Vec::new();

    for point in points {
        let cex_price = match point.cex_price {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => continue,
        };
        if !point.dex_price.is_finite() || point.dex_price <= 0.0 {
            continue;
        }

        risk_ctx.observe(point.dex_price, point.cex_volume);

        if point.dex_price > cex_price {
            let profit =
                profit_buy_cex_sell_dex(cex_price, point.dex_price, point.gas_price, cfg);
            if profit > cfg.profit_threshold {
                let trade_size_eth = cfg.investment * (1.0 - cfg.fee_rate_cex) / cex_price;
                opportunities.push(Opportunity {
                    block_time: point.block_time,
                    buy_venue: Venue::Binance,
                    sell_venue: Venue::Uniswap,
                    buy_price: cex_price,
                    sell_price: point.dex_price,
                    profit,
                    risk: risk_ctx.assess(profit, cfg.investment, trade_size_eth),
                });
            }
        } else if cex_price > point.dex_price {
            let profit =
                profit_buy_dex_sell_cex(cex_price, point.dex_price, point.gas_price, cfg);
            if profit > cfg.profit_threshold {
                let trade_size_eth =
                    (cfg.investment - cfg.investment * cfg.fee_rate_dex) / point.dex_price;
                opportunities.push(Opportunity {
                    block_time: point.block_time,
                    buy_venue: Venue::Uniswap,
                    sell_venue: Venue::Binance,
                    buy_price: point.dex_price,
                    sell_price: cex_price,
                    profit,
                    risk: risk_ctx.assess(profit, cfg.investment, trade_size_eth),
                });
            }
        }
    }

    opportunities
}

fn parse_bound(value: &Option<String>, name: &str) -> Result<Option<DateTime<FixedOffset>>, HandlerError> {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(Some)
            .map_err(|e| HandlerError::InvalidConfig(format!("{name}: {e}"))),
        None => Ok(None),
    }
}

/// 拉取对齐后的价格序列
///
/// 每条链上成交配上对手交易所在
/// [block_time - delay - window, block_time - delay + window]
/// 区间内的均价和累计成交量，无成交时均价为NULL。
async fn fetch_price_points(
    txn: &DatabaseTransaction,
    cfg: &StrategyConfig,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
) -> Result<Vec<PricePoint>, HandlerError> {
    let mut values: Vec<Value> = vec![
        ((cfg.time_delay_seconds + cfg.window_seconds) as f64).into(),
        ((cfg.time_delay_seconds - cfg.window_seconds) as f64).into(),
    ];

    let mut sql = String::from(
        "SELECT u.block_time, u.price AS dex_price, u.gas_price, \
         AVG(b.price) AS cex_price, COALESCE(SUM(b.qty), 0.0) AS cex_volume \
         FROM uniswap_swaps u \
         LEFT JOIN binance_trades b \
         ON b.trade_time >= u.block_time - make_interval(secs => $1) \
         AND b.trade_time <= u.block_time - make_interval(secs => $2)",
    );

    let mut conditions = Vec::new();
    if let Some(start) = start {
        values.push(start.into());
        conditions.push(format!("u.block_time >= ${}", values.len()));
    }
    if let Some(end) = end {
        values.push(end.into());
        conditions.push(format!("u.block_time <= ${}", values.len()));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" GROUP BY u.id, u.block_time, u.price, u.gas_price ORDER BY u.block_time, u.id");

    let rows = txn
        .query_all(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            values,
        ))
        .await?;

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        points.push(PricePoint {
            block_time: row.try_get("", "block_time").map_err(HandlerError::from)?,
            dex_price: row.try_get("", "dex_price").map_err(HandlerError::from)?,
            gas_price: row.try_get("", "gas_price").map_err(HandlerError::from)?,
            cex_price: row.try_get("", "cex_price").map_err(HandlerError::from)?,
            cex_volume: row.try_get("", "cex_volume").map_err(HandlerError::from)?,
        });
    }
    Ok(points)
}

async fn next_batch_id(txn: &DatabaseTransaction) -> Result<i32, HandlerError> {
    let row = txn
        .query_one(Statement::from_string(
            DbBackend::Postgres,
            "SELECT COALESCE(MAX(batch_id), 0) + 1 AS next_id FROM arbitrage_opportunities",
        ))
        .await?;

    match row {
        Some(row) => Ok(row.try_get("", "next_id").map_err(HandlerError::from)?),
        None => Ok(1),
    }
}

#[async_trait]
impl JobHandler for AnalyseHandler {
    async fn execute(
        &self,
        txn: &DatabaseTransaction,
        ctx: &JobContext,
    ) -> Result<String, HandlerError> {
        let cfg: StrategyConfig = ctx.parse_config()?;
        let start = parse_bound(&cfg.start_time, "start_time")?;
        let end = parse_bound(&cfg.end_time, "end_time")?;

        ctx.checkpoint().await?;
        let points = fetch_price_points(txn, &cfg, start, end).await?;
        info!(task_id = %ctx.task_id, points = points.len(), "price points aligned");

        ctx.checkpoint().await?;
        let opportunities = detect_opportunities(&points, &cfg);
        let batch_id = match cfg.batch_id {
            Some(id) => id,
            None => next_batch_id(txn).await?,
        };

        if cfg.overwrite {
            // Replace the batch wholesale so reruns do not stack rows.
            arbitrage_opportunity::Entity::delete_many()
                .filter(arbitrage_opportunity::Column::BatchId.eq(batch_id))
                .exec(txn)
                .await?;
        }

        for chunk in opportunities.chunks(INSERT_CHUNK) {
            ctx.checkpoint().await?;
            let models = chunk.iter().map(|op| arbitrage_opportunity::ActiveModel {
                batch_id: Set(batch_id),
                block_time: Set(op.block_time),
                buy_venue: Set(op.buy_venue.to_string()),
                sell_venue: Set(op.sell_venue.to_string()),
                buy_price: Set(op.buy_price),
                sell_price: Set(op.sell_price),
                profit: Set(op.profit),
                details: Set(serde_json::to_value(&op.risk).ok()),
                ..Default::default()
            });
            arbitrage_opportunity::Entity::insert_many(models)
                .exec(txn)
                .await?;
        }

        Ok(format!(
            "analysed {} price points, recorded {} opportunities in batch {}",
            points.len(),
            opportunities.len(),
            batch_id
        ))
    }
}
