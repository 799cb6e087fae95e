// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 任务仓库实现
pub mod task_repo_impl;

pub use task_repo_impl::TaskRepositoryImpl;
