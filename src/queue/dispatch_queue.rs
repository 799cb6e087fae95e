// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::TaskType;
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// 消息编解码错误
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// 队列消息
///
/// 提交任务时推入分发队列的载荷。消息在出队时即视为
/// 已消费，不做重投递（至多一次交付）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueMessage {
    /// 对外任务ID
    pub task_id: String,
    /// 任务类型
    pub task_type: TaskType,
    /// 任务配置
    pub config: serde_json::Value,
}

/// 分发队列特质
///
/// 连接提交侧和执行侧的持久化队列。
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// 发布一条任务消息
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// 阻塞式消费一条任务消息
    ///
    /// 在内部超时时间内无消息、或取出的消息被丢弃时返回None，
    /// 调用方应循环重试。
    async fn consume(&self) -> Result<Option<QueueMessage>, QueueError>;
}

#[async_trait]
impl<T: DispatchQueue + ?Sized> DispatchQueue for Arc<T> {
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.as_ref().publish(message).await
    }

    async fn consume(&self) -> Result<Option<QueueMessage>, QueueError> {
        self.as_ref().consume().await
    }
}

/// Redis列表分发队列实现
///
/// LPUSH发布、BRPOP消费，先进先出。BRPOP取走消息即完成
/// 确认，之后的投递责任由任务状态机承担。
#[derive(Clone)]
pub struct RedisDispatchQueue {
    /// Redis客户端
    client: redis::Client,
    /// 队列键名
    queue_key: String,
}

impl RedisDispatchQueue {
    /// 创建新的Redis分发队列实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    /// * `queue_key` - 队列键名
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisDispatchQueue)` - 分发队列实例
    /// * `Err(QueueError)` - 创建过程中出现的错误
    pub fn new(redis_url: &str, queue_key: String) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, queue_key })
    }
}

/// 解码出队的消息载荷
///
/// 无法解码的载荷无法重投递（已被BRPOP取走），记一次
/// 丢弃计数后跳过，不让单条坏消息卡住消费循环。
fn decode_message(payload: &str) -> Option<QueueMessage> {
    match serde_json::from_str(payload) {
        Ok(message) => Some(message),
        Err(err) => {
            counter!("queue_messages_dropped_total").increment(1);
            warn!(error = %err, "dropping undecodable queue message");
            None
        }
    }
}

#[async_trait]
impl DispatchQueue for RedisDispatchQueue {
    async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_string(message)?;
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async::<()>(&mut con)
            .await?;
        Ok(())
    }

    async fn consume(&self) -> Result<Option<QueueMessage>, QueueError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;

        // Short block timeout keeps the worker loop responsive to shutdown.
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue_key)
            .arg(5.0)
            .query_async(&mut con)
            .await?;

        match reply {
            Some((_key, payload)) => Ok(decode_message(&payload)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_roundtrip() {
        // Given: 一条带配置的队列消息
        let message = QueueMessage {
            task_id: "task-42".to_string(),
            task_type: TaskType::Analyse,
            config: json!({"investment": 5000.0}),
        };

        let payload = serde_json::to_string(&message).unwrap();
        let decoded: QueueMessage = serde_json::from_str(&payload).unwrap();

        assert_eq!(decoded, message);
    }

    #[test]
    fn test_undecodable_payload_is_dropped() {
        // Given: 一条坏载荷和一条合法载荷
        assert!(decode_message("not json").is_none());

        let payload = r#"{"task_id":"t1","task_type":"analyse","config":{}}"#;
        let message = decode_message(payload).unwrap();
        assert_eq!(message.task_type, TaskType::Analyse);
    }

    #[test]
    fn test_message_type_uses_snake_case() {
        let message = QueueMessage {
            task_id: "task-1".to_string(),
            task_type: TaskType::CollectBinance,
            config: json!({}),
        };

        let payload = serde_json::to_string(&message).unwrap();
        assert!(payload.contains("\"collect_binance\""));
    }
}
