// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use super::routes::routes;
use super::state::StatusState;

/// 启动状态服务
///
/// # 参数
///
/// * `addr` - 监听地址
/// * `state` - 共享状态
/// * `shutdown` - 为 `true` 时优雅退出
///
/// # 返回值
///
/// 返回实际绑定的地址
pub async fn spawn_status_server(
    addr: &str,
    state: StatusState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Status server listening on {}", local_addr);

    let app = routes(state);
    tokio::spawn(async move {
        let shutdown_signal = async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Status server error: {}", e);
        }
    });

    Ok(local_addr)
}
