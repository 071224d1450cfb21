// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::presentation::handlers::{metrics_handler, progress_handler};
use crate::presentation::state::StatusState;

/// 创建状态服务路由
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version))
        .route("/progress", get(progress_handler::progress))
        .route("/metrics", get(metrics_handler::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
