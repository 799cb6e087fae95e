// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

use crate::application::dto::task_request::{ListLogsQuery, ListTasksQuery, SubmitTaskRequestDto};
use crate::application::dto::task_response::{
    CancelTaskResponseDto, SubmitTaskResponseDto, TaskListResponseDto, TaskLogDto,
    TaskResponseDto,
};
use crate::domain::models::task::{Task, TaskStatus, TaskType};
use crate::domain::repositories::task_repository::TaskRepository;
use crate::presentation::errors::AppError;
use crate::queue::{DispatchQueue, QueueMessage};

/// 提交新任务
///
/// 校验请求后把任务以WAIT状态落库并发布到分发队列。
/// 未知的任务类型字符串在这里直接拒绝。
pub async fn submit_task(
    Extension(repo): Extension<Arc<dyn TaskRepository>>,
    Extension(queue): Extension<Arc<dyn DispatchQueue>>,
    Json(payload): Json<SubmitTaskRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(errors) = payload.validate() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": errors.to_string() })),
        )
            .into_response());
    }

    let Ok(task_type) = payload.task_type.parse::<TaskType>() else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("unknown task type '{}'", payload.task_type) })),
        )
            .into_response());
    };

    let task_id = payload
        .task_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let task = Task::new(
        task_id,
        task_type,
        payload.trigger.unwrap_or_else(|| "api".to_string()),
        payload.config.clone(),
    );
    let created = repo.create(&task).await?;

    let message = QueueMessage {
        task_id: created.task_id.clone(),
        task_type,
        config: created.config.clone(),
    };
    if let Err(err) = queue.publish(&message).await {
        // The row exists but can never be dispatched. Fail it so the
        // caller is not left with a task stuck in WAIT.
        error!(task_id = %created.task_id, error = %err, "failed to publish task");
        repo.mark_terminal(
            &created.task_id,
            TaskStatus::Failed,
            Some("failed to publish to dispatch queue"),
        )
        .await?;
        return Err(AppError::from(err));
    }

    counter!("tasks_submitted_total").increment(1);
    info!(task_id = %created.task_id, task_type = %task_type, "task submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitTaskResponseDto {
            task_id: created.task_id,
            status: created.status.to_string(),
        }),
    )
        .into_response())
}

/// 查询任务详情
pub async fn get_task(
    Extension(repo): Extension<Arc<dyn TaskRepository>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match repo.find_by_task_id(&task_id).await? {
        Some(task) => Ok((StatusCode::OK, Json(TaskResponseDto::from(task))).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// 分页列出任务
pub async fn list_tasks(
    Extension(repo): Extension<Arc<dyn TaskRepository>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.clamp(1, 200);
    let (tasks, total) = repo.list(query.page, limit).await?;

    Ok(Json(TaskListResponseDto {
        tasks: tasks.into_iter().map(TaskResponseDto::from).collect(),
        total,
        page: query.page,
        limit,
    }))
}

/// 请求取消任务
///
/// 排队中的任务立即取消；运行中的任务打上取消标记，
/// 由执行器在下一个检查点感知；终态任务不受影响。
pub async fn cancel_task(
    Extension(repo): Extension<Arc<dyn TaskRepository>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if repo.find_by_task_id(&task_id).await?.is_none() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let cancelled = repo.request_cancel(&task_id).await?;
    let status = repo
        .find_by_task_id(&task_id)
        .await?
        .map(|t| t.status.to_string())
        .unwrap_or_else(|| TaskStatus::Cancelled.to_string());

    info!(task_id = %task_id, cancelled, "cancellation requested");

    Ok((
        StatusCode::OK,
        Json(CancelTaskResponseDto {
            task_id,
            cancelled,
            status,
        }),
    )
        .into_response())
}

/// 查询任务日志
pub async fn get_task_logs(
    Extension(repo): Extension<Arc<dyn TaskRepository>>,
    Path(task_id): Path<String>,
    Query(query): Query<ListLogsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let logs = repo
        .list_logs(&task_id, query.limit.clamp(1, 1000), query.offset)
        .await?;

    Ok(Json(
        logs.into_iter().map(TaskLogDto::from).collect::<Vec<_>>(),
    ))
}
