// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作管理器
pub mod manager;

/// 任务工作器
pub mod task_worker;
