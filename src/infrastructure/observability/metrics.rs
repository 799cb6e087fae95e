// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// 初始化指标系统
///
/// 配置并注册应用所需的各类监控指标
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    builder
        .install()
        .expect("failed to install Prometheus recorder");

    // Register metrics
    describe_counter!("tasks_submitted_total", "Total number of tasks submitted");
    describe_counter!("tasks_succeeded_total", "Total number of tasks succeeded");
    describe_counter!("tasks_failed_total", "Total number of tasks failed");
    describe_counter!("tasks_cancelled_total", "Total number of tasks cancelled");
    describe_counter!(
        "queue_messages_dropped_total",
        "Total number of undecodable queue messages dropped"
    );
    describe_histogram!("task_duration_seconds", "Duration of tasks in seconds");
    describe_gauge!("workers_active", "Number of workers currently executing a task");
}
