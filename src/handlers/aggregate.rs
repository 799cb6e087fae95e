// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::handlers::{HandlerError, JobContext, JobHandler};
use crate::infrastructure::database::entities::aggregated_price;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait, QueryFilter,
    Statement, Value,
};
use serde::Deserialize;
use tracing::info;

/// 聚合任务配置
#[derive(Debug, Deserialize)]
pub struct AggregateConfig {
    /// 聚合粒度（1m/5m/15m/1h/4h/1d）
    #[serde(default = "default_interval")]
    pub interval: String,
    /// 起始时间（RFC 3339），缺省时取数据最早时刻
    #[serde(default)]
    pub start_time: Option<String>,
    /// 结束时间（RFC 3339），缺省时取数据最晚时刻
    #[serde(default)]
    pub end_time: Option<String>,
}

fn default_interval() -> String {
    "1m".to_string()
}

/// 粒度标签到桶宽（秒）的映射
pub fn bucket_seconds(interval: &str) -> Option<i64> {
    match interval {
        "1m" => Some(60),
        "5m" => Some(300),
        "15m" => Some(900),
        "1h" => Some(3600),
        "4h" => Some(14400),
        "1d" => Some(86400),
        _ => None,
    }
}

/// 把时间范围切成UTC自然日窗口
///
/// 每个窗口左闭右开，首尾窗口按给定边界截断。
/// 逐日处理让取消检查点有固定的步长。
pub fn day_windows(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let day_start = cursor
            .with_timezone(&Utc)
            .with_hour(0)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(cursor.with_timezone(&Utc));
        let next_day: DateTime<FixedOffset> = (day_start + Duration::days(1)).into();
        let window_end = next_day.min(end);
        windows.push((cursor, window_end));
        cursor = window_end;
    }
    windows
}

/// 价格聚合处理器
///
/// 把两个场所的原始成交按固定桶宽聚合为均价序列，
/// 逐日处理并在每天之间设置取消检查点。
#[derive(Default)]
pub struct AggregateHandler;

impl AggregateHandler {
    /// 创建新的聚合处理器
    pub fn new() -> Self {
        Self
    }
}

async fn data_range(
    txn: &DatabaseTransaction,
) -> Result<Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>, HandlerError> {
    let row = txn
        .query_one(Statement::from_string(
            DbBackend::Postgres,
            "SELECT MIN(t) AS min_t, MAX(t) AS max_t FROM ( \
             SELECT trade_time AS t FROM binance_trades \
             UNION ALL \
             SELECT block_time AS t FROM uniswap_swaps) src",
        ))
        .await?;

    let Some(row) = row else { return Ok(None) };
    let min_t: Option<DateTime<FixedOffset>> = row.try_get("", "min_t")?;
    let max_t: Option<DateTime<FixedOffset>> = row.try_get("", "max_t")?;
    Ok(min_t.zip(max_t))
}

async fn aggregate_window(
    txn: &DatabaseTransaction,
    bucket: i64,
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
) -> Result<u64, HandlerError> {
    // Re-running a window replaces its buckets.
    aggregated_price::Entity::delete_many()
        .filter(aggregated_price::Column::TimeBucket.gte(from))
        .filter(aggregated_price::Column::TimeBucket.lt(to))
        .exec(txn)
        .await?;

    let mut inserted = 0u64;
    for (table, time_column, source) in [
        ("binance_trades", "trade_time", "binance"),
        ("uniswap_swaps", "block_time", "uniswap"),
    ] {
        let sql = format!(
            "INSERT INTO aggregated_prices (time_bucket, source, average_price) \
             SELECT to_timestamp(floor(extract(epoch FROM {time_column}) / $1) * $1), '{source}', AVG(price) \
             FROM {table} \
             WHERE {time_column} >= $2 AND {time_column} < $3 \
             GROUP BY 1"
        );
        let values: Vec<Value> = vec![(bucket as f64).into(), from.into(), to.into()];
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

fn parse_bound(
    value: &Option<String>,
    name: &str,
) -> Result<Option<DateTime<FixedOffset>>, HandlerError> {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(Some)
            .map_err(|e| HandlerError::InvalidConfig(format!("{name}: {e}"))),
        None => Ok(None),
    }
}

#[async_trait]
impl JobHandler for AggregateHandler {
    async fn execute(
        &self,
        txn: &DatabaseTransaction,
        ctx: &JobContext,
    ) -> Result<String, HandlerError> {
        let cfg: AggregateConfig = ctx.parse_config()?;
        let bucket = bucket_seconds(&cfg.interval).ok_or_else(|| {
            HandlerError::InvalidConfig(format!("unknown interval '{}'", cfg.interval))
        })?;

        let start = parse_bound(&cfg.start_time, "start_time")?;
        let end = parse_bound(&cfg.end_time, "end_time")?;

        let range = match (start, end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => {
                let data = data_range(txn).await?;
                data.map(|(min_t, max_t)| {
                    (
                        start.unwrap_or(min_t),
                        // 右开区间，包含最后一条数据
                        end.unwrap_or(max_t + Duration::seconds(1)),
                    )
                })
            }
        };

        let Some((from, to)) = range else {
            return Ok("no market data to aggregate".to_string());
        };
        if from >= to {
            return Err(HandlerError::InvalidConfig(
                "start_time must be before end_time".to_string(),
            ));
        }

        let mut buckets_written = 0u64;
        let windows = day_windows(from, to);
        let days = windows.len();
        for (day_start, day_end) in windows {
            ctx.checkpoint().await?;
            buckets_written += aggregate_window(txn, bucket, day_start, day_end).await?;
            info!(task_id = %ctx.task_id, day = %day_start.date_naive(), "day aggregated");
        }

        Ok(format!(
            "aggregated {} days at interval {} into {} buckets",
            days, cfg.interval, buckets_written
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, TransactionTrait};

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().into()
    }

    #[test]
    fn test_bucket_seconds_known_intervals() {
        assert_eq!(bucket_seconds("1m"), Some(60));
        assert_eq!(bucket_seconds("5m"), Some(300));
        assert_eq!(bucket_seconds("15m"), Some(900));
        assert_eq!(bucket_seconds("1h"), Some(3600));
        assert_eq!(bucket_seconds("4h"), Some(14400));
        assert_eq!(bucket_seconds("1d"), Some(86400));
        assert_eq!(bucket_seconds("2h"), None);
    }

    #[test]
    fn test_day_windows_split_and_clamp() {
        // Given: 跨三天的范围，首尾不在日界上
        let windows = day_windows(ts(2024, 5, 1, 6), ts(2024, 5, 3, 18));

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], (ts(2024, 5, 1, 6), ts(2024, 5, 2, 0)));
        assert_eq!(windows[1], (ts(2024, 5, 2, 0), ts(2024, 5, 3, 0)));
        assert_eq!(windows[2], (ts(2024, 5, 3, 0), ts(2024, 5, 3, 18)));
    }

    #[test]
    fn test_day_windows_single_partial_day() {
        let windows = day_windows(ts(2024, 5, 1, 6), ts(2024, 5, 1, 9));
        assert_eq!(windows, vec![(ts(2024, 5, 1, 6), ts(2024, 5, 1, 9))]);
    }

    #[test]
    fn test_day_windows_empty_range() {
        assert!(day_windows(ts(2024, 5, 2, 0), ts(2024, 5, 1, 0)).is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_window_counts_only_inserted_buckets() {
        // Given: 删除命中5行，两侧各插入若干桶
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 5,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 4,
                },
            ])
            .into_connection();
        let txn = db.begin().await.unwrap();

        let inserted = aggregate_window(&txn, 60, ts(2024, 5, 1, 0), ts(2024, 5, 2, 0))
            .await
            .unwrap();

        // Then: 被替换掉的旧桶不计入写入量
        assert_eq!(inserted, 7);
    }
}
