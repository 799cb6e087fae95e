// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::handlers::{HandlerError, JobContext, JobHandler};
use crate::infrastructure::database::entities::uniswap_swap;
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, EntityTrait, Set};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SWAPS_QUERY: &str = "\
query Swaps($cursor: ID!, $start: Int!, $end: Int!, $first: Int!) { \
  swaps(first: $first, orderBy: id, where: { id_gt: $cursor, timestamp_gte: $start, timestamp_lte: $end }) { \
    id timestamp amount0 amount1 transaction { id gasPrice } \
  } \
}";

/// Uniswap采集任务配置
#[derive(Debug, Deserialize)]
pub struct CollectUniswapConfig {
    /// 采集起始时间（RFC 3339）
    pub start_time: String,
    /// 采集结束时间（RFC 3339）
    pub end_time: String,
    /// 每页条数，上游上限1000
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    1000
}

/// 上游返回的一条原始交易
#[derive(Debug, Clone, PartialEq)]
pub struct RawSwap {
    /// 交易ID，同时是分页游标
    pub id: String,
    /// 成交时刻（epoch秒）
    pub timestamp: i64,
    /// token0数量
    pub amount0: f64,
    /// token1数量
    pub amount1: f64,
    /// 交易gas价格（wei）
    pub gas_price: f64,
    /// 交易哈希
    pub tx_hash: String,
}

/// 交易分页拉取特质
///
/// 按id游标顺序翻页，页长不足page_size即为最后一页。
#[async_trait]
pub trait SwapPageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        cursor: &str,
        start_ts: i64,
        end_ts: i64,
        page_size: u32,
    ) -> Result<Vec<RawSwap>, HandlerError>;
}

/// 由成交数量计算价格
///
/// 价格为|amount1 / amount0|，amount0为零或结果非有限时
/// 该条交易作废。
pub fn swap_price(amount0: f64, amount1: f64) -> Option<f64> {
    if amount0 == 0.0 {
        return None;
    }
    let price = (amount1 / amount0).abs();
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<SwapData>,
    errors: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SwapData {
    swaps: Vec<GraphqlSwap>,
}

#[derive(Deserialize)]
struct GraphqlSwap {
    id: String,
    timestamp: String,
    amount0: String,
    amount1: String,
    transaction: GraphqlTransaction,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlTransaction {
    id: String,
    gas_price: String,
}

impl GraphqlSwap {
    fn into_raw(self) -> Option<RawSwap> {
        Some(RawSwap {
            timestamp: self.timestamp.parse().ok()?,
            amount0: self.amount0.parse().ok()?,
            amount1: self.amount1.parse().ok()?,
            gas_price: self.transaction.gas_price.parse().ok()?,
            tx_hash: self.transaction.id,
            id: self.id,
        })
    }
}

/// 基于subgraph的GraphQL分页拉取实现
///
/// 请求失败时按固定间隔重试。
pub struct GraphqlSwapFetcher {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl GraphqlSwapFetcher {
    /// 创建新的subgraph拉取器
    ///
    /// # 参数
    ///
    /// * `url` - subgraph端点URL
    /// * `api_key` - 可选的API密钥
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            api_key,
            retry: RetryPolicy::fixed(Duration::from_secs(5), 5),
        }
    }

    async fn request_page(
        &self,
        cursor: &str,
        start_ts: i64,
        end_ts: i64,
        page_size: u32,
    ) -> Result<Vec<RawSwap>, HandlerError> {
        let body = json!({
            "query": SWAPS_QUERY,
            "variables": {
                "cursor": cursor,
                "start": start_ts,
                "end": end_ts,
                "first": page_size,
            },
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| HandlerError::Upstream(e.to_string()))?;

        let parsed: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| HandlerError::Upstream(e.to_string()))?;

        if let Some(errors) = parsed.errors {
            return Err(HandlerError::Upstream(errors.to_string()));
        }

        let swaps = parsed
            .data
            .ok_or_else(|| HandlerError::Upstream("empty response body".to_string()))?
            .swaps;

        Ok(swaps
            .into_iter()
            .filter_map(|swap| {
                let id = swap.id.clone();
                let raw = swap.into_raw();
                if raw.is_none() {
                    warn!(swap_id = %id, "unparseable swap dropped");
                }
                raw
            })
            .collect())
    }
}

#[async_trait]
impl SwapPageFetcher for GraphqlSwapFetcher {
    async fn fetch_page(
        &self,
        cursor: &str,
        start_ts: i64,
        end_ts: i64,
        page_size: u32,
    ) -> Result<Vec<RawSwap>, HandlerError> {
        let mut attempt = 0u32;
        loop {
            match self.request_page(cursor, start_ts, end_ts, page_size).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    attempt += 1;
                    if !self.retry.should_retry(attempt) {
                        return Err(err);
                    }
                    let backoff = self.retry.calculate_backoff(attempt);
                    warn!(error = %err, attempt, "swap page fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Uniswap交易数据采集处理器
///
/// 按id游标分页拉取指定时间范围内的交易，逐页写入，
/// 页与页之间设置取消检查点。
pub struct CollectUniswapHandler {
    fetcher: Arc<dyn SwapPageFetcher>,
}

impl CollectUniswapHandler {
    /// 创建新的采集处理器
    pub fn new(fetcher: Arc<dyn SwapPageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl JobHandler for CollectUniswapHandler {
    async fn execute(
        &self,
        txn: &DatabaseTransaction,
        ctx: &JobContext,
    ) -> Result<String, HandlerError> {
        let cfg: CollectUniswapConfig = ctx.parse_config()?;
        let start_ts = DateTime::parse_from_rfc3339(&cfg.start_time)
            .map_err(|e| HandlerError::InvalidConfig(format!("start_time: {e}")))?
            .timestamp();
        let end_ts = DateTime::parse_from_rfc3339(&cfg.end_time)
            .map_err(|e| HandlerError::InvalidConfig(format!("end_time: {e}")))?
            .timestamp();
        if start_ts >= end_ts {
            return Err(HandlerError::InvalidConfig(
                "start_time must be before end_time".to_string(),
            ));
        }

        let mut cursor = String::new();
        let mut pages = 0usize;
        let mut inserted = 0usize;
        let mut skipped = 0usize;

        loop {
            ctx.checkpoint().await?;
            let page = self
                .fetcher
                .fetch_page(&cursor, start_ts, end_ts, cfg.page_size)
                .await?;
            let page_len = page.len();
            if let Some(last) = page.last() {
                cursor = last.id.clone();
            }

            let mut models = Vec::with_capacity(page_len);
            for swap in page {
                let Some(price) = swap_price(swap.amount0, swap.amount1) else {
                    skipped += 1;
                    continue;
                };
                let Some(block_time) = DateTime::<Utc>::from_timestamp(swap.timestamp, 0) else {
                    skipped += 1;
                    continue;
                };
                models.push(uniswap_swap::ActiveModel {
                    block_time: Set(block_time.into()),
                    price: Set(price),
                    amount0: Set(swap.amount0),
                    amount1: Set(swap.amount1),
                    gas_price: Set(swap.gas_price),
                    tx_hash: Set(swap.tx_hash),
                    ..Default::default()
                });
            }

            if !models.is_empty() {
                inserted += models.len();
                uniswap_swap::Entity::insert_many(models).exec(txn).await?;
            }

            pages += 1;
            info!(task_id = %ctx.task_id, pages, inserted, "swap page stored");

            if page_len < cfg.page_size as usize {
                break;
            }
        }

        Ok(format!(
            "collected {} swaps over {} pages ({} dropped)",
            inserted, pages, skipped
        ))
    }
}
