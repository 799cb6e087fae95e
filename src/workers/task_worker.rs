// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::execution::executor::TaskExecutor;
use crate::queue::DispatchQueue;
use metrics::gauge;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 任务工作器
///
/// 循环消费分发队列并交给执行器。队列不可用时按固定间隔
/// 重连，直到任务成功取出或进程被关闭。
pub struct TaskWorker {
    /// 工作器编号，仅用于日志
    id: usize,
    executor: Arc<TaskExecutor>,
    /// 队列消费失败后的重连间隔
    reconnect_delay: Duration,
}

impl TaskWorker {
    /// 创建新的任务工作器
    ///
    /// # 参数
    ///
    /// * `id` - 工作器编号
    /// * `executor` - 任务执行器
    /// * `reconnect_delay` - 队列消费失败后的重连间隔
    pub fn new(id: usize, executor: Arc<TaskExecutor>, reconnect_delay: Duration) -> Self {
        Self {
            id,
            executor,
            reconnect_delay,
        }
    }

    /// 工作器主循环
    ///
    /// 消息一旦从队列取出即视为已交付，执行器负责把任务
    /// 推进到终态。
    pub async fn run<Q: DispatchQueue>(&self, queue: Q) {
        info!(worker_id = self.id, "worker started");
        loop {
            let message = match queue.consume().await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => {
                    error!(worker_id = self.id, error = %err, "queue consume failed, reconnecting");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };

            gauge!("workers_active").increment(1.0);
            if let Err(err) = self.executor.execute(message).await {
                // The task row may be left RUNNING; operators recover
                // it by cancelling and resubmitting.
                error!(worker_id = self.id, error = %err, "task execution aborted");
            }
            gauge!("workers_active").decrement(1.0);
        }
    }
}
