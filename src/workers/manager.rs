// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::execution::executor::TaskExecutor;
use crate::queue::DispatchQueue;
use crate::workers::task_worker::TaskWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 工作管理器
pub struct WorkerManager<Q>
where
    Q: DispatchQueue + Clone + 'static,
{
    queue: Q,
    executor: Arc<TaskExecutor>,
    reconnect_delay: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl<Q> WorkerManager<Q>
where
    Q: DispatchQueue + Clone + 'static,
{
    /// 创建新的工作管理器
    ///
    /// # 参数
    ///
    /// * `queue` - 分发队列
    /// * `executor` - 任务执行器
    /// * `reconnect_delay` - 工作器的队列重连间隔
    pub fn new(queue: Q, executor: Arc<TaskExecutor>, reconnect_delay: Duration) -> Self {
        Self {
            queue,
            executor,
            reconnect_delay,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 创建并启动指定数量的工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub async fn start_workers(&mut self, count: usize) {
        for id in 0..count {
            let worker = TaskWorker::new(id, self.executor.clone(), self.reconnect_delay);
            let queue = self.queue.clone();
            // We spawn the worker loop on a separate task to avoid blocking the main thread
            // or the loop that spawns workers.
            let handle = tokio::spawn(async move {
                worker.run(queue).await;
            });
            self.handles.push(handle);
        }
    }

    /// 等待关闭信号并关闭工作进程
    ///
    /// 监听关闭信号并优雅地关闭所有工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        info!("Shutting down workers...");
        for handle in &self.handles {
            handle.abort();
        }

        info!("Workers shut down successfully");
    }
}
