// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// 安装 Prometheus 指标记录器
///
/// 指标通过状态服务的 `/metrics` 端点渲染；安装失败时返回 `None`，指标调用变为空操作
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe();
            info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

fn describe() {
    metrics::describe_counter!("audit_jobs_total", "Page jobs completed, by final state");
    metrics::describe_counter!(
        "audit_outcomes_total",
        "Audit plugin outcomes, by plugin and success"
    );
    metrics::describe_counter!(
        "frontier_links_admitted_total",
        "Discovered links admitted to the frontier"
    );
    metrics::describe_counter!(
        "browser_session_restarts_total",
        "Browser sessions recycled after becoming unresponsive"
    );
}
