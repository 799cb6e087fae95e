// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 任务实体
///
/// 表示系统中一个已提交的工作单元，可以是数据导入、
/// 链上数据采集、价格聚合或套利分析等不同类型的任务。
/// 任务状态由状态机驱动，终态一旦写入便不再变更。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 内部自增ID，日志表通过该ID关联
    pub id: i64,
    /// 对外任务ID，由调用方提供的不透明字符串，全局唯一
    pub task_id: String,
    /// 任务类型，决定任务的处理方式和业务逻辑
    pub task_type: TaskType,
    /// 任务状态，跟踪任务在其生命周期中的当前阶段
    pub status: TaskStatus,
    /// 触发来源（api、manual等）
    pub trigger: String,
    /// 任务配置，入队后不可变的参数负载
    pub config: serde_json::Value,
    /// 入队时间
    pub queued_at: Option<DateTime<FixedOffset>>,
    /// 开始执行时间，最多被设置一次
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 结束时间，最多被设置一次
    pub finished_at: Option<DateTime<FixedOffset>>,
    /// 执行耗时（秒），finished_at - coalesce(started_at, queued_at)
    pub duration_seconds: i64,
    /// 终态的简短说明信息
    pub log_summary: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 任务类型枚举
///
/// 定义了系统中支持的不同类型的任务，每种类型对应一个
/// 在启动时注册的处理器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// 导入Binance成交数据（CSV批量导入）
    #[default]
    CollectBinance,
    /// 采集Uniswap交易数据（分页拉取）
    CollectUniswap,
    /// 聚合两个价格流到固定时间粒度
    Aggregate,
    /// 套利机会分析
    Analyse,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskType::CollectBinance => write!(f, "collect_binance"),
            TaskType::CollectUniswap => write!(f, "collect_uniswap"),
            TaskType::Aggregate => write!(f, "aggregate"),
            TaskType::Analyse => write!(f, "analyse"),
        }
    }
}

impl FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collect_binance" => Ok(TaskType::CollectBinance),
            "collect_uniswap" => Ok(TaskType::CollectUniswap),
            "aggregate" => Ok(TaskType::Aggregate),
            "analyse" => Ok(TaskType::Analyse),
            _ => Err(()),
        }
    }
}

/// 任务状态枚举
///
/// 表示任务在其生命周期中的不同状态。状态转换遵循以下流程：
/// WAIT → RUNNING → SUCCESS/FAILED/CANCELLED，
/// 以及排队阶段的抢先取消 WAIT → CANCELLED。
/// 终态是吸收态，到达终态后任何状态写入都是幂等空操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    /// 等待中，任务已创建并入队但尚未开始执行
    #[default]
    #[serde(rename = "WAIT")]
    Wait,
    /// 运行中，任务正在被某个工作器执行
    #[serde(rename = "RUNNING")]
    Running,
    /// 成功，任务执行完成且事务已提交
    #[serde(rename = "SUCCESS")]
    Success,
    /// 失败，任务执行出错且事务已回滚
    #[serde(rename = "FAILED")]
    Failed,
    /// 已取消，任务被取消且部分写入已回滚
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl TaskStatus {
    /// 判断状态是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Wait => write!(f, "WAIT"),
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::Success => write!(f, "SUCCESS"),
            TaskStatus::Failed => write!(f, "FAILED"),
            TaskStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAIT" => Ok(TaskStatus::Wait),
            "RUNNING" => Ok(TaskStatus::Running),
            "SUCCESS" => Ok(TaskStatus::Success),
            "FAILED" => Ok(TaskStatus::Failed),
            "CANCELLED" => Ok(TaskStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，当任务状态转换不符合业务规则时发生
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Task {
    /// 创建一个新的等待中任务
    ///
    /// # 参数
    ///
    /// * `task_id` - 对外任务ID
    /// * `task_type` - 任务类型
    /// * `trigger` - 触发来源
    /// * `config` - 任务配置
    ///
    /// # 返回值
    ///
    /// 返回状态为WAIT的新任务实例
    pub fn new(
        task_id: String,
        task_type: TaskType,
        trigger: String,
        config: serde_json::Value,
    ) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: 0,
            task_id,
            task_type,
            status: TaskStatus::Wait,
            trigger,
            config,
            queued_at: Some(now),
            started_at: None,
            finished_at: None,
            duration_seconds: 0,
            log_summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 计算终态耗时（秒）
    ///
    /// 以 finished 时刻减去 started_at，若任务从未开始执行
    /// 则回退到 queued_at（抢先取消的情形）。
    pub fn duration_until(&self, finished: DateTime<FixedOffset>) -> i64 {
        let origin = self.started_at.or(self.queued_at);
        match origin {
            Some(start) => (finished - start).num_seconds().max(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_task_new_is_wait() {
        // Given: 新创建的任务
        let task = Task::new(
            "task-1".to_string(),
            TaskType::Analyse,
            "api".to_string(),
            json!({}),
        );

        // Then: 初始状态为WAIT，尚无开始/结束时间
        assert_eq!(task.status, TaskStatus::Wait);
        assert!(task.queued_at.is_some());
        assert!(task.started_at.is_none());
        assert!(task.finished_at.is_none());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TaskStatus::Wait,
            TaskStatus::Running,
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            let parsed: TaskStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("unknown".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_type_parse() {
        assert_eq!(
            "collect_binance".parse::<TaskType>().unwrap(),
            TaskType::CollectBinance
        );
        assert_eq!("analyse".parse::<TaskType>().unwrap(), TaskType::Analyse);
        assert!("drop_tables".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Wait.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_duration_falls_back_to_queued_at() {
        // Given: 从未开始执行就被取消的任务
        let task = Task::new(
            "task-2".to_string(),
            TaskType::Aggregate,
            "api".to_string(),
            json!({}),
        );
        let finished = task.queued_at.unwrap() + Duration::seconds(42);

        // Then: 耗时以queued_at为起点
        assert_eq!(task.duration_until(finished), 42);
    }
}
