// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::TaskStatus;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::execution::cancellation::CancellationCheck;
use crate::execution::registry::HandlerRegistry;
use crate::handlers::{HandlerError, JobContext};
use crate::queue::QueueMessage;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// 执行器错误类型
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 数据库事务错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// 单次执行的裁决结果
#[derive(Debug, PartialEq)]
enum Outcome {
    /// 提交事务，任务成功
    Success(String),
    /// 回滚事务，任务被取消
    Cancelled,
    /// 回滚事务，任务失败
    Failed(String),
}

/// 根据处理器结果和收尾取消检查裁决任务归宿
///
/// 取消请求到达后，处理器的任何结果都作废，成功和失败
/// 同样让位于取消，保证状态机不出现CANCELLED之后的改写。
fn decide_outcome(result: Result<String, HandlerError>, cancelled_after: bool) -> Outcome {
    if cancelled_after {
        return Outcome::Cancelled;
    }
    match result {
        Ok(summary) => Outcome::Success(summary),
        Err(HandlerError::Cancelled) => Outcome::Cancelled,
        Err(err) => Outcome::Failed(err.to_string()),
    }
}

/// 任务执行器
///
/// 从队列消息到终态的完整执行流程：状态抢占、事务包裹、
/// 处理器调用、裁决与终态落库。
pub struct TaskExecutor {
    db: Arc<DatabaseConnection>,
    repository: Arc<dyn TaskRepository>,
    registry: Arc<HandlerRegistry>,
    cancel: Arc<dyn CancellationCheck>,
}

impl TaskExecutor {
    /// 创建新的任务执行器
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接，用于开启任务事务
    /// * `repository` - 任务仓库
    /// * `registry` - 处理器注册表
    /// * `cancel` - 取消探针
    pub fn new(
        db: Arc<DatabaseConnection>,
        repository: Arc<dyn TaskRepository>,
        registry: Arc<HandlerRegistry>,
        cancel: Arc<dyn CancellationCheck>,
    ) -> Self {
        Self {
            db,
            repository,
            registry,
            cancel,
        }
    }

    /// 执行一条队列消息
    ///
    /// 消息在此之前已从队列中取走，本方法保证任务要么到达
    /// 终态，要么因状态抢占失败而被安全跳过。
    pub async fn execute(&self, message: QueueMessage) -> Result<(), ExecutorError> {
        let task_id = message.task_id.as_str();

        // Claim the task. Only one delivery ever flips WAIT to RUNNING.
        if !self.repository.mark_running(task_id).await? {
            if self.cancel.is_cancelled(task_id).await {
                // Pre-emptive cancellation: record the finish, skip the work.
                let changed = self
                    .repository
                    .mark_terminal(task_id, TaskStatus::Cancelled, Some("cancelled while queued"))
                    .await?;
                if changed {
                    counter!("tasks_cancelled_total").increment(1);
                    info!(task_id = %task_id, "task cancelled before start");
                }
            } else {
                warn!(task_id = %task_id, "task not in WAIT state, skipping delivery");
            }
            return Ok(());
        }

        self.repository
            .append_log(task_id, "INFO", "task started")
            .await?;
        info!(task_id = %task_id, task_type = %message.task_type, "task started");

        let handler = match self.registry.get(message.task_type) {
            Some(handler) => handler,
            None => {
                let summary = format!("no handler registered for task type {}", message.task_type);
                self.finish(task_id, TaskStatus::Failed, &summary, 0.0).await?;
                return Ok(());
            }
        };

        let started = Instant::now();
        let ctx = JobContext::new(
            task_id.to_string(),
            message.config.clone(),
            self.cancel.clone(),
        );

        // All handler writes go through this transaction: the task's
        // effects land entirely or not at all.
        let txn = self.db.begin().await?;
        let result = handler.execute(&txn, &ctx).await;
        let cancelled_after = self.cancel.is_cancelled(task_id).await;
        let elapsed = started.elapsed().as_secs_f64();

        match decide_outcome(result, cancelled_after) {
            Outcome::Success(summary) => {
                txn.commit().await?;
                self.finish(task_id, TaskStatus::Success, &summary, elapsed)
                    .await?;
            }
            Outcome::Cancelled => {
                txn.rollback().await?;
                self.finish(task_id, TaskStatus::Cancelled, "cancelled during execution", elapsed)
                    .await?;
            }
            Outcome::Failed(message) => {
                txn.rollback().await?;
                self.finish(task_id, TaskStatus::Failed, &message, elapsed)
                    .await?;
            }
        }

        Ok(())
    }

    async fn finish(
        &self,
        task_id: &str,
        status: TaskStatus,
        summary: &str,
        elapsed: f64,
    ) -> Result<(), ExecutorError> {
        self.repository
            .mark_terminal(task_id, status, Some(summary))
            .await?;
        self.repository
            .append_log(task_id, terminal_log_level(status), summary)
            .await?;

        histogram!("task_duration_seconds").record(elapsed);
        match status {
            TaskStatus::Success => {
                counter!("tasks_succeeded_total").increment(1);
                info!(task_id = %task_id, summary = %summary, "task succeeded");
            }
            TaskStatus::Cancelled => {
                counter!("tasks_cancelled_total").increment(1);
                info!(task_id = %task_id, "task cancelled");
            }
            _ => {
                counter!("tasks_failed_total").increment(1);
                error!(task_id = %task_id, summary = %summary, "task failed");
            }
        }

        Ok(())
    }
}

fn terminal_log_level(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Failed => "ERROR",
        _ => "INFO",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::{Task, TaskType};
    use crate::domain::repositories::task_repository::TaskLogEntry;
    use crate::execution::cancellation::test_support::FlagCancellation;
    use async_trait::async_trait;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DatabaseTransaction, MockDatabase};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 测试用内存任务仓库
    #[derive(Default)]
    struct InMemoryRepo {
        tasks: Mutex<HashMap<String, (TaskStatus, Option<String>, bool)>>,
    }

    impl InMemoryRepo {
        fn with_task(task_id: &str, status: TaskStatus) -> Self {
            let repo = Self::default();
            repo.tasks
                .lock()
                .unwrap()
                .insert(task_id.to_string(), (status, None, false));
            repo
        }

        fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
            self.tasks.lock().unwrap().get(task_id).map(|t| t.0)
        }

        fn summary_of(&self, task_id: &str) -> Option<String> {
            self.tasks
                .lock()
                .unwrap()
                .get(task_id)
                .and_then(|t| t.1.clone())
        }
    }

    #[async_trait]
    impl TaskRepository for InMemoryRepo {
        async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
            Ok(task.clone())
        }

        async fn find_by_task_id(&self, _task_id: &str) -> Result<Option<Task>, RepositoryError> {
            Ok(None)
        }

        async fn list(&self, _page: u64, _limit: u64) -> Result<(Vec<Task>, u64), RepositoryError> {
            Ok((vec![], 0))
        }

        async fn mark_running(&self, task_id: &str) -> Result<bool, RepositoryError> {
            let mut tasks = self.tasks.lock().unwrap();
            match tasks.get_mut(task_id) {
                Some(entry) if entry.0 == TaskStatus::Wait => {
                    entry.0 = TaskStatus::Running;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn mark_terminal(
            &self,
            task_id: &str,
            status: TaskStatus,
            summary: Option<&str>,
        ) -> Result<bool, RepositoryError> {
            let mut tasks = self.tasks.lock().unwrap();
            match tasks.get_mut(task_id) {
                Some(entry) if !entry.2 => {
                    entry.0 = status;
                    entry.1 = summary.map(|s| s.to_string());
                    entry.2 = true;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Err(RepositoryError::NotFound),
            }
        }

        async fn request_cancel(&self, task_id: &str) -> Result<bool, RepositoryError> {
            let mut tasks = self.tasks.lock().unwrap();
            match tasks.get_mut(task_id) {
                Some(entry) if !entry.0.is_terminal() => {
                    entry.0 = TaskStatus::Cancelled;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn is_cancelled(&self, task_id: &str) -> Result<bool, RepositoryError> {
            let tasks = self.tasks.lock().unwrap();
            Ok(tasks
                .get(task_id)
                .map(|t| t.0 == TaskStatus::Cancelled)
                .unwrap_or(true))
        }

        async fn append_log(
            &self,
            _task_id: &str,
            _level: &str,
            _message: &str,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn list_logs(
            &self,
            _task_id: &str,
            _limit: u64,
            _offset: u64,
        ) -> Result<Vec<TaskLogEntry>, RepositoryError> {
            Ok(vec![])
        }
    }

    struct OkHandler;

    #[async_trait]
    impl crate::handlers::JobHandler for OkHandler {
        async fn execute(
            &self,
            _txn: &DatabaseTransaction,
            _ctx: &JobContext,
        ) -> Result<String, HandlerError> {
            Ok("processed 3 rows".to_string())
        }
    }

    struct FailHandler;

    #[async_trait]
    impl crate::handlers::JobHandler for FailHandler {
        async fn execute(
            &self,
            _txn: &DatabaseTransaction,
            _ctx: &JobContext,
        ) -> Result<String, HandlerError> {
            Err(HandlerError::Upstream("subgraph unreachable".to_string()))
        }
    }

    struct CheckpointHandler;

    #[async_trait]
    impl crate::handlers::JobHandler for CheckpointHandler {
        async fn execute(
            &self,
            _txn: &DatabaseTransaction,
            ctx: &JobContext,
        ) -> Result<String, HandlerError> {
            ctx.checkpoint().await?;
            Ok("should not get here".to_string())
        }
    }

    fn mock_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn message(task_type: TaskType) -> QueueMessage {
        QueueMessage {
            task_id: "task-1".to_string(),
            task_type,
            config: json!({}),
        }
    }

    fn executor(
        repo: Arc<InMemoryRepo>,
        registry: HandlerRegistry,
        cancel: Arc<FlagCancellation>,
    ) -> TaskExecutor {
        TaskExecutor::new(mock_db(), repo, Arc::new(registry), cancel)
    }

    #[test]
    fn test_decide_outcome() {
        assert_eq!(
            decide_outcome(Ok("done".to_string()), false),
            Outcome::Success("done".to_string())
        );
        // 取消请求已到达时，成功和失败的结果都作废
        assert_eq!(decide_outcome(Ok("done".to_string()), true), Outcome::Cancelled);
        assert_eq!(
            decide_outcome(Err(HandlerError::Upstream("boom".to_string())), true),
            Outcome::Cancelled
        );
        assert_eq!(
            decide_outcome(Err(HandlerError::Cancelled), false),
            Outcome::Cancelled
        );
        assert!(matches!(
            decide_outcome(
                Err(HandlerError::Upstream("boom".to_string())),
                false
            ),
            Outcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_success_path_reaches_success() {
        // Given: WAIT状态的任务和一个成功的处理器
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Wait));
        let registry = HandlerRegistry::new().register(TaskType::Aggregate, Arc::new(OkHandler));
        let exec = executor(repo.clone(), registry, Arc::new(FlagCancellation::default()));

        exec.execute(message(TaskType::Aggregate)).await.unwrap();

        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Success));
        assert_eq!(repo.summary_of("task-1").unwrap(), "processed 3 rows");
    }

    #[tokio::test]
    async fn test_handler_error_reaches_failed() {
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Wait));
        let registry = HandlerRegistry::new().register(TaskType::Analyse, Arc::new(FailHandler));
        let exec = executor(repo.clone(), registry, Arc::new(FlagCancellation::default()));

        exec.execute(message(TaskType::Analyse)).await.unwrap();

        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Failed));
        assert!(repo.summary_of("task-1").unwrap().contains("subgraph unreachable"));
    }

    #[tokio::test]
    async fn test_checkpoint_cancel_reaches_cancelled() {
        // Given: 取消标志在执行前已置位
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Wait));
        let cancel = Arc::new(FlagCancellation::default());
        cancel.cancel();
        let registry =
            HandlerRegistry::new().register(TaskType::Aggregate, Arc::new(CheckpointHandler));
        let exec = executor(repo.clone(), registry, cancel);

        exec.execute(message(TaskType::Aggregate)).await.unwrap();

        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_failed_handler_with_cancel_flag_reaches_cancelled() {
        // Given: 处理器失败，但取消请求已在执行期间到达
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Wait));
        let cancel = Arc::new(FlagCancellation::default());
        cancel.cancel();
        let registry = HandlerRegistry::new().register(TaskType::Analyse, Arc::new(FailHandler));
        let exec = executor(repo.clone(), registry, cancel);

        exec.execute(message(TaskType::Analyse)).await.unwrap();

        // Then: 取消优先于迟到的失败，终态为CANCELLED
        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_unregistered_type_reaches_failed() {
        // Given: 注册表中没有对应处理器
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Wait));
        let exec = executor(
            repo.clone(),
            HandlerRegistry::new(),
            Arc::new(FlagCancellation::default()),
        );

        exec.execute(message(TaskType::CollectUniswap)).await.unwrap();

        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Failed));
        assert!(repo
            .summary_of("task-1")
            .unwrap()
            .contains("no handler registered"));
    }

    #[tokio::test]
    async fn test_precancelled_task_is_finished_without_running() {
        // Given: 任务在排队阶段已被取消，取消探针直接查询仓库
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Cancelled));
        let probe = crate::execution::cancellation::DbCancellationProbe::new(repo.clone());
        let exec = TaskExecutor::new(
            mock_db(),
            repo.clone(),
            Arc::new(HandlerRegistry::new().register(TaskType::Aggregate, Arc::new(OkHandler))),
            Arc::new(probe),
        );

        exec.execute(message(TaskType::Aggregate)).await.unwrap();

        // Then: 处理器未被调用，任务带着取消摘要收尾
        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Cancelled));
        assert_eq!(repo.summary_of("task-1").unwrap(), "cancelled while queued");
    }

    #[tokio::test]
    async fn test_redelivery_of_running_task_is_skipped() {
        // Given: 任务已在运行（重复投递的场景）
        let repo = Arc::new(InMemoryRepo::with_task("task-1", TaskStatus::Running));
        let registry = HandlerRegistry::new().register(TaskType::Aggregate, Arc::new(OkHandler));
        let exec = executor(repo.clone(), registry, Arc::new(FlagCancellation::default()));

        exec.execute(message(TaskType::Aggregate)).await.unwrap();

        // Then: 不抢占也不落终态，状态保持RUNNING
        assert_eq!(repo.status_of("task-1"), Some(TaskStatus::Running));
        assert!(repo.summary_of("task-1").is_none());
    }
}
