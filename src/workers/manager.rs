// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::audit_worker::{AuditWorker, WorkerOptions, WorkerSummary};
use super::dispatcher::AuditDispatcher;
use crate::config::settings::Settings;
use crate::domain::repositories::result_repository::ResultRepository;
use crate::domain::services::frontier::Frontier;
use crate::domain::services::progress_tracker::ProgressTracker;
use crate::engines::traits::BrowserLauncher;
use crate::utils::errors::ConfigurationError;
use crate::utils::preflight::PreflightChecker;

/// 工作管理器
///
/// 启动固定数量的审计 worker，等待它们全部退出后标记运行结束
pub struct WorkerManager {
    frontier: Arc<Frontier>,
    dispatcher: Arc<AuditDispatcher>,
    launcher: Arc<dyn BrowserLauncher>,
    results: Arc<dyn ResultRepository>,
    progress: Arc<ProgressTracker>,
    settings: Arc<Settings>,
    handles: Vec<JoinHandle<WorkerSummary>>,
}

impl WorkerManager {
    pub fn new(
        frontier: Arc<Frontier>,
        dispatcher: Arc<AuditDispatcher>,
        launcher: Arc<dyn BrowserLauncher>,
        results: Arc<dyn ResultRepository>,
        progress: Arc<ProgressTracker>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            frontier,
            dispatcher,
            launcher,
            results,
            progress,
            settings,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 创建并启动指定数量的 worker，每个 worker 拥有自己的 HTTP 客户端和浏览器会话
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的 worker 数量
    pub fn start_workers(&mut self, count: usize) -> Result<(), ConfigurationError> {
        let options = WorkerOptions::from_settings(&self.settings);
        for _ in 0..count {
            let id = self.handles.len();
            let http = PreflightChecker::new(
                &self.settings.effective_user_agent(),
                self.settings.header_check_timeout(),
            )?;
            let worker = AuditWorker::new(
                id,
                self.frontier.clone(),
                self.dispatcher.clone(),
                self.launcher.clone(),
                http,
                self.results.clone(),
                self.progress.clone(),
                options.clone(),
            );
            self.handles.push(tokio::spawn(worker.run()));
        }
        info!(
            "Started {} audit workers using the {} launcher",
            count,
            self.launcher.name()
        );
        Ok(())
    }

    /// 监听停止信号，收到后停止前沿分发
    pub fn stop_on(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let frontier = self.frontier.clone();
        tokio::spawn(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    info!("Shutdown requested, finishing in-flight jobs");
                    frontier.stop();
                    break;
                }
            }
        })
    }

    /// 等待所有 worker 退出
    ///
    /// # 返回值
    ///
    /// 返回每个 worker 的运行统计
    pub async fn wait_for_completion(&mut self) -> Vec<WorkerSummary> {
        let mut summaries = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("Audit worker terminated abnormally: {}", e),
            }
        }
        self.progress.finish();
        summaries
    }
}
