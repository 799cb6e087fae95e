// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 任务仓库接口
pub mod task_repository;

pub use task_repository::{RepositoryError, TaskLogEntry, TaskRepository};
