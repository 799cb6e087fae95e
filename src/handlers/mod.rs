// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::execution::cancellation::CancellationCheck;
use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, DbErr};
use std::sync::Arc;
use thiserror::Error;

/// 聚合任务处理器
pub mod aggregate;

/// 套利分析任务处理器
pub mod analyse;

/// Binance成交数据导入处理器
pub mod collect_binance;

/// Uniswap交易数据采集处理器
pub mod collect_uniswap;

/// 风险评估
pub mod risk;

/// 处理器错误类型
#[derive(Error, Debug)]
pub enum HandlerError {
    /// 任务在检查点处发现已被取消
    #[error("Task cancelled")]
    Cancelled,

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// 任务配置无法解析
    #[error("Invalid task config: {0}")]
    InvalidConfig(String),

    /// IO错误（读取数据文件等）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 上游数据源请求错误
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// 任务执行上下文
///
/// 携带任务标识、不可变配置和取消探针，贯穿处理器执行全程。
pub struct JobContext {
    /// 对外任务ID
    pub task_id: String,
    /// 任务配置
    pub config: serde_json::Value,
    /// 取消探针
    cancel: Arc<dyn CancellationCheck>,
}

impl JobContext {
    /// 创建新的执行上下文
    pub fn new(
        task_id: String,
        config: serde_json::Value,
        cancel: Arc<dyn CancellationCheck>,
    ) -> Self {
        Self {
            task_id,
            config,
            cancel,
        }
    }

    /// 解析任务配置为指定类型
    pub fn parse_config<T: serde::de::DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| HandlerError::InvalidConfig(e.to_string()))
    }

    /// 取消检查点
    ///
    /// 处理器在每个工作批次之间调用。发现取消时返回错误，
    /// 由执行器回滚事务并落终态。
    pub async fn checkpoint(&self) -> Result<(), HandlerError> {
        if self.cancel.is_cancelled(&self.task_id).await {
            return Err(HandlerError::Cancelled);
        }
        Ok(())
    }
}

/// 任务处理器特质
///
/// 每种任务类型注册一个处理器。处理器的所有数据库写入
/// 都通过传入的事务句柄进行，保证全部提交或全部回滚。
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 执行任务
    ///
    /// # 参数
    ///
    /// * `txn` - 包裹本次执行的数据库事务
    /// * `ctx` - 执行上下文
    ///
    /// # 返回值
    ///
    /// * `Ok(String)` - 成功摘要，写入任务的log_summary
    /// * `Err(HandlerError)` - 失败或取消
    async fn execute(
        &self,
        txn: &DatabaseTransaction,
        ctx: &JobContext,
    ) -> Result<String, HandlerError>;
}
