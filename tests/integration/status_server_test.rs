// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use a11y_crawler::domain::services::progress_tracker::ProgressTracker;
use a11y_crawler::presentation::routes;
use a11y_crawler::presentation::server::spawn_status_server;
use a11y_crawler::presentation::state::StatusState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::sync::Arc;
use tokio::sync::watch;
use tower::util::ServiceExt;

fn state(progress: Arc<ProgressTracker>) -> StatusState {
    StatusState {
        progress,
        prometheus: None,
    }
}

/// 健康检查测试
///
/// 验证健康检查端点是否正常工作
#[tokio::test]
async fn health_check_works() {
    let app = routes::routes(state(Arc::new(ProgressTracker::new(0))));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

/// 进度端点测试
///
/// 验证进度快照的字段名称与数值
#[tokio::test]
async fn progress_endpoint_reports_snapshot() {
    let progress = Arc::new(ProgressTracker::new(4));
    progress.record_completion("[audited] https://example.com/");
    let app = routes::routes(state(progress));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["iteration"], 1);
    assert_eq!(json["total"], 4);
    assert_eq!(json["percent"], 25);
    assert_eq!(json["state"], "running");
    assert_eq!(json["logs"][0], "[audited] https://example.com/");
    assert!(json.get("elapsed").is_some());
    assert!(json.get("remaining").is_some());
    assert!(json.get("speed").is_some());
}

/// 未安装指标记录器时 /metrics 返回 503
#[tokio::test]
async fn metrics_unavailable_without_recorder() {
    let app = routes::routes(state(Arc::new(ProgressTracker::new(0))));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// 状态服务可通过真实端口访问，并在收到信号后退出
#[tokio::test]
async fn status_server_serves_and_shuts_down() {
    let progress = Arc::new(ProgressTracker::new(2));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr = spawn_status_server("127.0.0.1:0", state(progress.clone()), shutdown_rx)
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let health = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status().as_u16(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");

    progress.record_completion("done");
    progress.finish();
    let body = client
        .get(format!("http://{}/progress", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(snapshot["state"], "finished");
    assert_eq!(snapshot["percent"], 50);

    shutdown_tx.send(true).unwrap();
}
