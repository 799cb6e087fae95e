// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::TaskType;
use crate::handlers::JobHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// 处理器注册表
///
/// 启动时一次性建好的任务类型到处理器的映射，运行期只读。
/// 未注册类型的任务在分发时直接落FAILED。
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个处理器
    ///
    /// # 参数
    ///
    /// * `task_type` - 任务类型
    /// * `handler` - 对应的处理器
    pub fn register(mut self, task_type: TaskType, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(task_type, handler);
        self
    }

    /// 查找任务类型对应的处理器
    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&task_type).cloned()
    }

    /// 判断任务类型是否已注册
    pub fn contains(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerError, JobContext};
    use async_trait::async_trait;
    use sea_orm::DatabaseTransaction;

    struct NoopHandler;

    #[async_trait]
    impl JobHandler for NoopHandler {
        async fn execute(
            &self,
            _txn: &DatabaseTransaction,
            _ctx: &JobContext,
        ) -> Result<String, HandlerError> {
            Ok("noop".to_string())
        }
    }

    #[test]
    fn test_lookup_registered_and_missing() {
        let registry =
            HandlerRegistry::new().register(TaskType::Aggregate, Arc::new(NoopHandler));

        assert!(registry.contains(TaskType::Aggregate));
        assert!(registry.get(TaskType::Aggregate).is_some());
        assert!(!registry.contains(TaskType::Analyse));
        assert!(registry.get(TaskType::Analyse).is_none());
    }
}
