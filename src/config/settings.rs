// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、Redis、服务器、工作器和数据源等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 工作器配置
    pub workers: WorkerSettings,
    /// 数据源配置
    pub sources: SourceSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// Redis配置设置
#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
    /// 分发队列键名
    pub queue_key: String,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 工作器配置设置
#[derive(Debug, Deserialize)]
pub struct WorkerSettings {
    /// 并发工作器数量
    pub count: usize,
    /// 队列消费失败后的重连间隔（秒）
    pub reconnect_delay: u64,
}

/// 数据源配置设置
#[derive(Debug, Deserialize)]
pub struct SourceSettings {
    /// Binance成交CSV文件路径
    pub binance_csv_path: String,
    /// Uniswap subgraph端点URL
    pub subgraph_url: String,
    /// subgraph API密钥
    pub subgraph_api_key: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB pool settings
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 10)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default queue settings
            .set_default("redis.queue_key", "arbrs:tasks")?
            // Default worker settings
            .set_default("workers.count", 5)?
            .set_default("workers.reconnect_delay", 5)?
            // Default source settings
            .set_default("sources.binance_csv_path", "./data/binance_trades.csv")?
            .set_default(
                "sources.subgraph_url",
                "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v3",
            )?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("ARBRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}
