// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::task_repository::TaskRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// 取消检查特质
///
/// 处理器在检查点处通过该接口感知取消请求，
/// 实现与具体存储解耦，便于测试注入。
#[async_trait]
pub trait CancellationCheck: Send + Sync {
    /// 查询任务是否已被请求取消
    async fn is_cancelled(&self, task_id: &str) -> bool;
}

/// 基于任务仓库的取消探针
///
/// 每次检查点都查询一次任务状态。查询出错时返回false，
/// 让任务继续执行，下一个检查点会再次探测。
pub struct DbCancellationProbe {
    repository: Arc<dyn TaskRepository>,
}

impl DbCancellationProbe {
    /// 创建新的取消探针
    pub fn new(repository: Arc<dyn TaskRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CancellationCheck for DbCancellationProbe {
    async fn is_cancelled(&self, task_id: &str) -> bool {
        match self.repository.is_cancelled(task_id).await {
            Ok(cancelled) => cancelled,
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "cancellation probe failed, assuming not cancelled");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 测试用取消开关
    #[derive(Default)]
    pub struct FlagCancellation {
        cancelled: AtomicBool,
    }

    impl FlagCancellation {
        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CancellationCheck for FlagCancellation {
        async fn is_cancelled(&self, _task_id: &str) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }
}
