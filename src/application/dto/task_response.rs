// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::Task;
use crate::domain::repositories::task_repository::TaskLogEntry;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// 任务详情响应数据传输对象
#[derive(Debug, Serialize)]
pub struct TaskResponseDto {
    /// 对外任务ID
    pub task_id: String,
    /// 任务类型
    pub task_type: String,
    /// 任务状态
    pub status: String,
    /// 触发来源
    pub trigger: String,
    /// 任务配置
    pub config: serde_json::Value,
    /// 入队时间
    pub queued_at: Option<DateTime<FixedOffset>>,
    /// 开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 结束时间
    pub finished_at: Option<DateTime<FixedOffset>>,
    /// 执行耗时（秒）
    pub duration_seconds: i64,
    /// 终态摘要
    pub log_summary: Option<String>,
}

impl From<Task> for TaskResponseDto {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            task_type: task.task_type.to_string(),
            status: task.status.to_string(),
            trigger: task.trigger,
            config: task.config,
            queued_at: task.queued_at,
            started_at: task.started_at,
            finished_at: task.finished_at,
            duration_seconds: task.duration_seconds,
            log_summary: task.log_summary,
        }
    }
}

/// 任务列表响应数据传输对象
#[derive(Debug, Serialize)]
pub struct TaskListResponseDto {
    /// 当前页任务
    pub tasks: Vec<TaskResponseDto>,
    /// 任务总数
    pub total: u64,
    /// 页码
    pub page: u64,
    /// 每页条数
    pub limit: u64,
}

/// 任务提交响应数据传输对象
#[derive(Debug, Serialize)]
pub struct SubmitTaskResponseDto {
    /// 对外任务ID
    pub task_id: String,
    /// 任务状态
    pub status: String,
}

/// 取消请求响应数据传输对象
#[derive(Debug, Serialize)]
pub struct CancelTaskResponseDto {
    /// 对外任务ID
    pub task_id: String,
    /// 本次请求是否改变了任务状态
    pub cancelled: bool,
    /// 请求处理后的任务状态
    pub status: String,
}

/// 任务日志响应数据传输对象
#[derive(Debug, Serialize)]
pub struct TaskLogDto {
    /// 记录时间
    pub timestamp: DateTime<FixedOffset>,
    /// 日志级别
    pub level: String,
    /// 日志内容
    pub message: String,
}

impl From<TaskLogEntry> for TaskLogDto {
    fn from(entry: TaskLogEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            level: entry.level,
            message: entry.message,
        }
    }
}
