// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::handlers::{HandlerError, JobContext, JobHandler};
use crate::infrastructure::database::entities::binance_trade;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{DatabaseTransaction, EntityTrait, Set};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

const INSERT_CHUNK: usize = 1000;

/// Binance导入任务配置
#[derive(Debug, Deserialize)]
pub struct CollectBinanceConfig {
    /// CSV文件路径，缺省时使用全局配置的路径
    #[serde(default)]
    pub csv_path: Option<String>,
    /// 采样百分比（0-100），向上取整到行数
    #[serde(default = "default_sample_percent")]
    pub sample_percent: f64,
}

fn default_sample_percent() -> f64 {
    100.0
}

/// 解析后的一条成交记录
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub id: i64,
    pub price: f64,
    pub qty: f64,
    pub quote_qty: f64,
    pub trade_time: DateTime<FixedOffset>,
    pub is_buyer_maker: bool,
    pub is_best_match: bool,
}

fn parse_bool(field: &str) -> Option<bool> {
    match field.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// 解析一行CSV成交记录
///
/// 列顺序：id,price,qty,quote_qty,time(微秒),is_buyer_maker,is_best_match。
/// 任一字段非法时返回None，由调用方跳过计数。
pub fn parse_trade_line(line: &str) -> Option<TradeRow> {
    let mut fields = line.split(',');
    let id = fields.next()?.trim().parse::<i64>().ok()?;
    let price = fields.next()?.trim().parse::<f64>().ok()?;
    let qty = fields.next()?.trim().parse::<f64>().ok()?;
    let quote_qty = fields.next()?.trim().parse::<f64>().ok()?;
    let micros = fields.next()?.trim().parse::<i64>().ok()?;
    let is_buyer_maker = parse_bool(fields.next()?)?;
    let is_best_match = parse_bool(fields.next()?)?;

    if !price.is_finite() || price <= 0.0 {
        return None;
    }

    let trade_time = DateTime::<Utc>::from_timestamp_micros(micros)?;
    Some(TradeRow {
        id,
        price,
        qty,
        quote_qty,
        trade_time: trade_time.into(),
        is_buyer_maker,
        is_best_match,
    })
}

/// 计算采样目标行数（向上取整）
pub fn target_rows(total: usize, percent: f64) -> usize {
    let percent = percent.clamp(0.0, 100.0);
    (total as f64 * percent / 100.0).ceil() as usize
}

/// 从文件头部读取目标数量的成交记录
///
/// 返回解析成功的记录和被跳过的非法行数。
pub fn load_trades(path: &Path, target: usize) -> Result<(Vec<TradeRow>, usize), HandlerError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut rows = Vec::with_capacity(target.min(INSERT_CHUNK));
    let mut skipped = 0usize;
    for line in reader.lines() {
        if rows.len() >= target {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_trade_line(&line) {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }
    Ok((rows, skipped))
}

fn count_lines(path: &Path) -> Result<usize, HandlerError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut count = 0usize;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Binance成交数据导入处理器
///
/// 按采样比例从本地CSV批量导入成交记录，分块写入，
/// 块与块之间设置取消检查点。
pub struct CollectBinanceHandler {
    default_csv_path: String,
}

impl CollectBinanceHandler {
    /// 创建新的导入处理器
    ///
    /// # 参数
    ///
    /// * `default_csv_path` - 任务配置未指定时使用的CSV路径
    pub fn new(default_csv_path: String) -> Self {
        Self { default_csv_path }
    }
}

#[async_trait]
impl JobHandler for CollectBinanceHandler {
    async fn execute(
        &self,
        txn: &DatabaseTransaction,
        ctx: &JobContext,
    ) -> Result<String, HandlerError> {
        let cfg: CollectBinanceConfig = ctx.parse_config()?;
        let path_string = cfg
            .csv_path
            .unwrap_or_else(|| self.default_csv_path.clone());
        let path = Path::new(&path_string);

        let total = count_lines(path)?;
        let target = target_rows(total, cfg.sample_percent);
        info!(task_id = %ctx.task_id, total, target, "importing trades");

        let (rows, skipped) = load_trades(path, target)?;
        if skipped > 0 {
            warn!(task_id = %ctx.task_id, skipped, "malformed lines skipped");
        }

        let imported = rows.len();
        for chunk in rows.chunks(INSERT_CHUNK) {
            ctx.checkpoint().await?;
            let models = chunk.iter().map(|row| binance_trade::ActiveModel {
                id: Set(row.id),
                price: Set(row.price),
                qty: Set(row.qty),
                quote_qty: Set(row.quote_qty),
                trade_time: Set(row.trade_time),
                is_buyer_maker: Set(row.is_buyer_maker),
                is_best_match: Set(row.is_best_match),
            });
            binance_trade::Entity::insert_many(models).exec(txn).await?;
        }

        Ok(format!(
            "imported {} of {} trades ({} malformed) from {}",
            imported, total, skipped, path_string
        ))
    }
}
