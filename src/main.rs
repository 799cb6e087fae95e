// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use arbrs::config::settings::Settings;
use arbrs::domain::models::task::TaskType;
use arbrs::domain::repositories::task_repository::TaskRepository;
use arbrs::execution::cancellation::DbCancellationProbe;
use arbrs::execution::executor::TaskExecutor;
use arbrs::execution::registry::HandlerRegistry;
use arbrs::handlers::aggregate::AggregateHandler;
use arbrs::handlers::analyse::AnalyseHandler;
use arbrs::handlers::collect_binance::CollectBinanceHandler;
use arbrs::handlers::collect_uniswap::{CollectUniswapHandler, GraphqlSwapFetcher};
use arbrs::infrastructure::database::connection;
use arbrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use arbrs::presentation::routes;
use arbrs::queue::{DispatchQueue, RedisDispatchQueue};
use arbrs::utils::telemetry;
use arbrs::workers::manager::WorkerManager;
use axum::Extension;
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting arbrs...");

    // Initialize Prometheus Metrics
    arbrs::infrastructure::observability::metrics::init_metrics();

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize dispatch queue
    let queue: Arc<dyn DispatchQueue> = Arc::new(RedisDispatchQueue::new(
        &settings.redis.url,
        settings.redis.queue_key.clone(),
    )?);
    info!("Dispatch queue initialized");

    // 5. Initialize repositories and execution components
    let task_repo: Arc<dyn TaskRepository> = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let probe = Arc::new(DbCancellationProbe::new(task_repo.clone()));

    let fetcher = Arc::new(GraphqlSwapFetcher::new(
        settings.sources.subgraph_url.clone(),
        settings.sources.subgraph_api_key.clone(),
    ));
    let registry = Arc::new(
        HandlerRegistry::new()
            .register(
                TaskType::CollectBinance,
                Arc::new(CollectBinanceHandler::new(
                    settings.sources.binance_csv_path.clone(),
                )),
            )
            .register(
                TaskType::CollectUniswap,
                Arc::new(CollectUniswapHandler::new(fetcher)),
            )
            .register(TaskType::Aggregate, Arc::new(AggregateHandler::new()))
            .register(TaskType::Analyse, Arc::new(AnalyseHandler::new())),
    );

    let executor = Arc::new(TaskExecutor::new(
        db.clone(),
        task_repo.clone(),
        registry,
        probe,
    ));

    // 6. Start workers
    let mut worker_manager = WorkerManager::new(
        queue.clone(),
        executor,
        Duration::from_secs(settings.workers.reconnect_delay),
    );
    worker_manager.start_workers(settings.workers.count).await;
    info!(count = settings.workers.count, "Workers started");

    // 7. Start HTTP server
    let app = routes::routes()
        .layer(Extension(task_repo))
        .layer(Extension(queue))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = worker_manager.wait_for_shutdown() => {}
    }

    Ok(())
}
