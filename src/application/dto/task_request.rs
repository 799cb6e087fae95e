// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 任务提交请求数据传输对象
///
/// 封装客户端提交新任务所需的参数。task_id由调用方提供并
/// 保证全局唯一，缺省时由服务端生成一个UUID。
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SubmitTaskRequestDto {
    /// 对外任务ID，全局唯一
    #[validate(length(min = 1, max = 64, message = "task_id must be 1-64 characters"))]
    pub task_id: Option<String>,
    /// 任务类型字符串
    #[validate(length(min = 1, message = "task_type cannot be empty"))]
    pub task_type: String,
    /// 触发来源，缺省为api
    pub trigger: Option<String>,
    /// 任务配置，透传给处理器
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}

/// 任务列表查询参数
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    /// 页码，从0开始
    #[serde(default)]
    pub page: u64,
    /// 每页条数
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

/// 任务日志查询参数
#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    /// 返回条数上限
    #[serde(default = "default_log_limit")]
    pub limit: u64,
    /// 偏移量
    #[serde(default)]
    pub offset: u64,
}

fn default_log_limit() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rejects_empty_task_id() {
        let dto = SubmitTaskRequestDto {
            task_id: Some("".to_string()),
            task_type: "analyse".to_string(),
            trigger: None,
            config: serde_json::json!({}),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_task_id_is_optional() {
        let dto: SubmitTaskRequestDto =
            serde_json::from_str(r#"{"task_type": "aggregate"}"#).unwrap();
        assert!(dto.task_id.is_none());
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_config_defaults_to_empty_object() {
        let dto: SubmitTaskRequestDto =
            serde_json::from_str(r#"{"task_id": "t1", "task_type": "aggregate"}"#).unwrap();
        assert_eq!(dto.config, serde_json::json!({}));
        assert!(dto.validate().is_ok());
    }
}
