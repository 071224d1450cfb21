// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::audits::registry::AuditPluginRegistry;
use crate::config::settings::Settings;
use crate::domain::models::progress::ProgressSnapshot;
use crate::domain::repositories::result_repository::{ResultRepository, ResultRow};
use crate::domain::services::frontier::{DomainStats, Frontier, FrontierConfig};
use crate::domain::services::progress_tracker::ProgressTracker;
use crate::domain::services::seed_registry::SeedRegistry;
use crate::engines::traits::BrowserLauncher;
use crate::utils::errors::ConfigurationError;
use crate::utils::robots::RobotsFetcher;
use crate::workers::audit_worker::WorkerSummary;
use crate::workers::dispatcher::{AuditDispatcher, DispatcherConfig};
use crate::workers::manager::WorkerManager;

pub const PAGES_SCANNED_STREAM: &str = "pages_scanned";

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-.]+").expect("Failed to compile name regex"));

// === Section: Use Case Definition ===

/// 一次完整审计运行的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub workers: Vec<WorkerSummary>,
    pub domains: Vec<DomainStats>,
    /// 页面数与上限不一致的域名
    pub short_domains: Vec<String>,
    pub snapshot: ProgressSnapshot,
}

/// 审计运行用例
///
/// 将种子注册表、前沿、worker 池与结果流串联成一次运行
pub struct RunAuditUseCase {
    settings: Arc<Settings>,
    launcher: Arc<dyn BrowserLauncher>,
    plugins: AuditPluginRegistry,
}

// === Section: Implementation ===

impl RunAuditUseCase {
    pub fn new(
        settings: Arc<Settings>,
        launcher: Arc<dyn BrowserLauncher>,
        plugins: AuditPluginRegistry,
    ) -> Self {
        Self {
            settings,
            launcher,
            plugins,
        }
    }

    /// 创建本次运行的结果目录并写入生效配置
    ///
    /// 目录形如 `{results_path}/{时间戳}_{审计名称}`
    pub fn prepare_results_dir(&self, now: DateTime<Local>) -> Result<PathBuf, ConfigurationError> {
        let name = format!(
            "{}_{}",
            now.format("%Y-%m-%d_%H-%M-%S"),
            sanitise_name(&self.settings.audit_name)
        );
        let dir = PathBuf::from(&self.settings.results_path).join(name);
        fs::create_dir_all(&dir)
            .map_err(|e| ConfigurationError::ResultsFolder(format!("{}: {}", dir.display(), e)))?;

        let config_json = serde_json::to_string_pretty(self.settings.as_ref())
            .map_err(|e| ConfigurationError::ResultsFolder(e.to_string()))?;
        fs::write(dir.join("config.json"), config_json)
            .map_err(|e| ConfigurationError::ResultsFolder(format!("{}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    /// 执行审计运行
    ///
    /// # 参数
    ///
    /// * `registry` - 已加载的种子注册表
    /// * `results` - 结果流仓库
    /// * `progress` - 进度跟踪器
    /// * `shutdown` - 为 `true` 时停止分发新任务
    ///
    /// # 返回值
    ///
    /// * `Ok(RunReport)` - 运行统计
    /// * `Err(ConfigurationError)` - 插件链或 HTTP 客户端无法构建
    pub async fn execute(
        &self,
        registry: &SeedRegistry,
        results: Arc<dyn ResultRepository>,
        progress: Arc<ProgressTracker>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunReport, ConfigurationError> {
        let chain = Arc::new(self.plugins.resolve(&self.settings.audit_plugins)?);
        let robots = RobotsFetcher::new(&self.settings.effective_user_agent())?;

        let frontier = Arc::new(Frontier::new(
            FrontierConfig::from_settings(&self.settings),
            robots,
            registry.entries(),
        ));
        progress.grow(frontier.pending_total());
        info!(
            "Auditing {} seed pages across {} domains with {} workers",
            frontier.pending_total(),
            frontier.domain_count(),
            self.settings.thread_count
        );

        let dispatcher = Arc::new(AuditDispatcher::new(
            chain,
            DispatcherConfig::from_settings(&self.settings),
        ));
        let mut manager = WorkerManager::new(
            frontier.clone(),
            dispatcher,
            self.launcher.clone(),
            results.clone(),
            progress.clone(),
            self.settings.clone(),
        );
        let stop_listener = manager.stop_on(shutdown);
        manager.start_workers(self.settings.thread_count)?;
        let workers = manager.wait_for_completion().await;
        stop_listener.abort();

        let domains = frontier.domain_stats();
        write_pages_scanned(results.as_ref(), &domains);
        let short_domains = self.verify(&domains);

        Ok(RunReport {
            workers,
            domains,
            short_domains,
            snapshot: progress.snapshot(),
        })
    }

    /// 检查每个域名审计的页面数是否达到上限
    fn verify(&self, domains: &[DomainStats]) -> Vec<String> {
        if !self.settings.crawl_enabled() {
            return Vec::new();
        }
        let expected = self.settings.max_links_per_domain + 1;
        domains
            .iter()
            .filter(|d| d.pages_audited != expected)
            .map(|d| {
                warn!(
                    "{} audited {} of {} pages{}",
                    d.domain,
                    d.pages_audited,
                    expected,
                    if d.abandoned { " (abandoned)" } else { "" }
                );
                d.domain.clone()
            })
            .collect()
    }
}

fn write_pages_scanned(results: &dyn ResultRepository, domains: &[DomainStats]) {
    for domain in domains {
        let row: ResultRow = vec![
            ("organisation".to_string(), domain.organisation.clone()),
            ("sector".to_string(), domain.sector.clone()),
            ("base_url".to_string(), domain.base_url.clone()),
            ("domain".to_string(), domain.domain.clone()),
            ("pages_audited".to_string(), domain.pages_audited.to_string()),
            ("links_admitted".to_string(), domain.links_admitted.to_string()),
            ("abandoned".to_string(), domain.abandoned.to_string()),
        ];
        if let Err(e) = results.append_row(PAGES_SCANNED_STREAM, &row) {
            error!("Failed to write pages scanned row: {}", e);
        }
    }
}

/// 把审计名称转换为安全的目录名
pub fn sanitise_name(name: &str) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(name.trim(), "_");
    let cleaned: String = cleaned.trim_matches('_').chars().take(50).collect();
    if cleaned.is_empty() {
        "audit".to_string()
    } else {
        cleaned
    }
}
