// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::repositories::task_repository::{
    RepositoryError, TaskLogEntry, TaskRepository,
};
use crate::infrastructure::database::entities::{task as task_entity, task_log};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use std::sync::Arc;

/// 终态状态字符串集合，条件更新时用作守卫
fn terminal_statuses() -> [String; 3] {
    [
        TaskStatus::Success.to_string(),
        TaskStatus::Failed.to_string(),
        TaskStatus::Cancelled.to_string(),
    ]
}

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层。所有状态迁移都是
/// 带状态过滤的条件更新，依赖数据库保证并发安全。
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_model(
        &self,
        task_id: &str,
    ) -> Result<Option<task_entity::Model>, RepositoryError> {
        let model = task_entity::Entity::find()
            .filter(task_entity::Column::TaskId.eq(task_id))
            .one(self.db.as_ref())
            .await?;
        Ok(model)
    }
}

impl From<task_entity::Model> for Task {
    fn from(model: task_entity::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            task_type: model.task_type.parse().unwrap_or_default(),
            status: model.status.parse().unwrap_or_default(),
            trigger: model.trigger,
            config: model.config,
            queued_at: model.queued_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
            duration_seconds: model.duration_seconds,
            log_summary: model.log_summary,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let model = task_entity::ActiveModel {
            task_id: Set(task.task_id.clone()),
            task_type: Set(task.task_type.to_string()),
            status: Set(task.status.to_string()),
            trigger: Set(task.trigger.clone()),
            config: Set(task.config.clone()),
            queued_at: Set(task.queued_at),
            started_at: Set(None),
            finished_at: Set(None),
            duration_seconds: Set(0),
            log_summary: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = model.insert(self.db.as_ref()).await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                RepositoryError::AlreadyExists
            } else {
                RepositoryError::Database(err)
            }
        })?;

        Ok(inserted.into())
    }

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<Task>, RepositoryError> {
        Ok(self.find_model(task_id).await?.map(Into::into))
    }

    async fn list(&self, page: u64, limit: u64) -> Result<(Vec<Task>, u64), RepositoryError> {
        let paginator = task_entity::Entity::find()
            .order_by_desc(task_entity::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit.max(1));

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page).await?;

        Ok((models.into_iter().map(Into::into).collect(), total))
    }

    async fn mark_running(&self, task_id: &str) -> Result<bool, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        // Conditional transition: only a WAIT task becomes RUNNING,
        // so started_at is written at most once.
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Running.to_string()),
            )
            .col_expr(task_entity::Column::StartedAt, Expr::value(now))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::TaskId.eq(task_id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Wait.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn mark_terminal(
        &self,
        task_id: &str,
        status: TaskStatus,
        summary: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let model = self
            .find_model(task_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let task: Task = model.into();
        let now: DateTime<FixedOffset> = Utc::now().into();
        let duration = task.duration_until(now);

        // Guard on finished_at rather than status: whether the finish
        // was written here or by an accepted cancel request, it is
        // recorded exactly once.
        let result = task_entity::Entity::update_many()
            .col_expr(task_entity::Column::Status, Expr::value(status.to_string()))
            .col_expr(task_entity::Column::FinishedAt, Expr::value(now))
            .col_expr(task_entity::Column::DurationSeconds, Expr::value(duration))
            .col_expr(
                task_entity::Column::LogSummary,
                Expr::value(summary.map(|s| s.to_string())),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::TaskId.eq(task_id))
            .filter(task_entity::Column::FinishedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn request_cancel(&self, task_id: &str) -> Result<bool, RepositoryError> {
        let model = self
            .find_model(task_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let task: Task = model.into();
        let now: DateTime<FixedOffset> = Utc::now().into();
        let duration = task.duration_until(now);

        // No-op for terminal tasks. A RUNNING task keeps executing
        // until its handler observes the flag at a checkpoint; the
        // finish written here stands even if the delivery is lost.
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Cancelled.to_string()),
            )
            .col_expr(task_entity::Column::FinishedAt, Expr::value(now))
            .col_expr(task_entity::Column::DurationSeconds, Expr::value(duration))
            .col_expr(
                task_entity::Column::LogSummary,
                Expr::value(Some("cancel requested".to_string())),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::TaskId.eq(task_id))
            .filter(task_entity::Column::Status.is_not_in(terminal_statuses()))
            .exec(self.db.as_ref())
            .await?;

        let accepted = result.rows_affected > 0;
        if accepted {
            self.append_log(task_id, "INFO", "cancel requested").await?;
        }
        Ok(accepted)
    }

    async fn is_cancelled(&self, task_id: &str) -> Result<bool, RepositoryError> {
        let model = self.find_model(task_id).await?;

        // A missing row is treated as cancelled so orphan work stops.
        match model {
            Some(model) => Ok(model.status == TaskStatus::Cancelled.to_string()),
            None => Ok(true),
        }
    }

    async fn append_log(
        &self,
        task_id: &str,
        level: &str,
        message: &str,
    ) -> Result<(), RepositoryError> {
        let model = self
            .find_model(task_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let entry = task_log::ActiveModel {
            task_id: Set(model.id),
            timestamp: Set(Utc::now().into()),
            level: Set(level.to_string()),
            message: Set(message.to_string()),
            ..Default::default()
        };
        entry.insert(self.db.as_ref()).await?;

        Ok(())
    }

    async fn list_logs(
        &self,
        task_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<TaskLogEntry>, RepositoryError> {
        let model = self
            .find_model(task_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let logs = task_log::Entity::find()
            .filter(task_log::Column::TaskId.eq(model.id))
            .order_by_asc(task_log::Column::Timestamp)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;

        Ok(logs
            .into_iter()
            .map(|log| TaskLogEntry {
                timestamp: log.timestamp,
                level: log.level,
                message: log.message,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn sample_model(status: TaskStatus) -> task_entity::Model {
        let now: DateTime<FixedOffset> = Utc::now().into();
        task_entity::Model {
            id: 7,
            task_id: "task-7".to_string(),
            task_type: "analyse".to_string(),
            status: status.to_string(),
            trigger: "api".to_string(),
            config: json!({}),
            queued_at: Some(now),
            started_at: None,
            finished_at: None,
            duration_seconds: 0,
            log_summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_mark_running_true_when_row_updated() {
        // Given: 条件更新命中一行
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        assert!(repo.mark_running("task-7").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_running_false_when_not_wait() {
        // Given: 任务不在WAIT状态，条件更新不命中任何行
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        assert!(!repo.mark_running("task-7").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_terminal_noop_when_already_finished() {
        // Given: 任务已有finished_at，终态写入不命中任何行
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(TaskStatus::Success)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        let changed = repo
            .mark_terminal("task-7", TaskStatus::Failed, Some("late failure"))
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_request_cancel_accepted_appends_log() {
        // Given: WAIT状态的任务，条件更新命中一行
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![sample_model(TaskStatus::Wait)],
                vec![sample_model(TaskStatus::Wait)],
            ])
            // Postgres inserts go through RETURNING, which the mock
            // serves from query results rather than exec results.
            .append_query_results([vec![task_log::Model {
                id: 1,
                task_id: 7,
                timestamp: Utc::now().into(),
                level: "INFO".to_string(),
                message: "cancel requested".to_string(),
            }]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 1,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        // Then: 取消被接受，终态字段和取消日志一并写入
        assert!(repo.request_cancel("task-7").await.unwrap());
    }

    #[tokio::test]
    async fn test_request_cancel_noop_for_terminal_task() {
        // Given: 任务已在终态，条件更新不命中任何行
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(TaskStatus::Success)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        // Then: 返回false且不追加日志
        assert!(!repo.request_cancel("task-7").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_cancelled_missing_row_is_cancelled() {
        // Given: 任务记录不存在
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<task_entity::Model>::new()])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        // Then: 保守地视为已取消
        assert!(repo.is_cancelled("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_cancelled_running_task() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_model(TaskStatus::Running)]])
            .into_connection();
        let repo = TaskRepositoryImpl::new(Arc::new(db));

        assert!(!repo.is_cancelled("task-7").await.unwrap());
    }
}
