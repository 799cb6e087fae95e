// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 取消探测
pub mod cancellation;

/// 任务执行器
pub mod executor;

/// 处理器注册表
pub mod registry;

pub use cancellation::{CancellationCheck, DbCancellationProbe};
pub use executor::{ExecutorError, TaskExecutor};
pub use registry::HandlerRegistry;
