// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 套利机会和风险指标模型
pub mod opportunity;

/// 策略参数模型
pub mod strategy;

/// 任务领域模型
pub mod task;

pub use opportunity::{Opportunity, PricePoint, RiskMetrics, Venue};
pub use strategy::StrategyConfig;
pub use task::{DomainError, Task, TaskStatus, TaskType};
