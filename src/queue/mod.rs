// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 任务分发队列
pub mod dispatch_queue;

pub use dispatch_queue::{DispatchQueue, QueueError, QueueMessage, RedisDispatchQueue};
