// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 任务ID重复
    #[error("Task already exists")]
    AlreadyExists,
}

/// 任务日志条目
#[derive(Debug, Clone)]
pub struct TaskLogEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub level: String,
    pub message: String,
}

/// 任务仓库特质
///
/// 定义任务数据访问接口。状态写入均为条件更新，
/// 终态写入对已终态的任务是幂等空操作。
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务（状态WAIT，记录queued_at）
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;

    /// 根据对外任务ID查找任务
    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<Task>, RepositoryError>;

    /// 分页列出任务，按创建时间倒序
    async fn list(&self, page: u64, limit: u64) -> Result<(Vec<Task>, u64), RepositoryError>;

    /// 尝试将任务从WAIT转为RUNNING
    ///
    /// 条件更新：仅当任务当前为WAIT时生效，并记录started_at。
    /// started_at最多被写入一次。
    ///
    /// # 返回值
    ///
    /// true表示本次调用完成了转换；false表示任务不在WAIT状态
    /// （已取消、已在运行或不存在）。
    async fn mark_running(&self, task_id: &str) -> Result<bool, RepositoryError>;

    /// 将任务写入终态
    ///
    /// 仅当任务尚未处于终态时生效，同时记录finished_at、
    /// duration_seconds和log_summary。对已终态任务为空操作。
    ///
    /// # 返回值
    ///
    /// true表示本次调用写入了终态；false表示任务已处于终态。
    async fn mark_terminal(
        &self,
        task_id: &str,
        status: TaskStatus,
        summary: Option<&str>,
    ) -> Result<bool, RepositoryError>;

    /// 请求取消任务
    ///
    /// WAIT状态直接转为CANCELLED（抢先取消）；RUNNING状态
    /// 转为CANCELLED作为取消信号，由执行器轮询感知；
    /// 终态任务不受影响。接受取消时一并写入finished_at、
    /// duration_seconds和摘要，并追加一条取消日志。
    ///
    /// # 返回值
    ///
    /// true表示状态发生了变化；false表示任务已处于终态。
    async fn request_cancel(&self, task_id: &str) -> Result<bool, RepositoryError>;

    /// 查询任务是否已被取消
    ///
    /// 任务记录缺失时视为已取消（保守处理）。
    async fn is_cancelled(&self, task_id: &str) -> Result<bool, RepositoryError>;

    /// 追加一条任务日志
    async fn append_log(
        &self,
        task_id: &str,
        level: &str,
        message: &str,
    ) -> Result<(), RepositoryError>;

    /// 按时间顺序列出任务日志
    async fn list_logs(
        &self,
        task_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<TaskLogEntry>, RepositoryError>;
}
