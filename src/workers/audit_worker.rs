// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

use super::dispatcher::{AuditDispatcher, DispatchResult};
use crate::config::settings::Settings;
use crate::domain::models::audit_outcome::AuditOutcome;
use crate::domain::models::page_job::{JobState, PageJob, Viewport};
use crate::domain::repositories::result_repository::{ResultRepository, ResultRow};
use crate::domain::services::frontier::Frontier;
use crate::domain::services::progress_tracker::ProgressTracker;
use crate::engines::traits::{BrowserError, BrowserLauncher, BrowserSession};
use crate::utils::link_extractor::extract_links;
use crate::utils::preflight::{PreflightChecker, PreflightVerdict};
use crate::utils::url_utils::is_same_domain;

pub const AUDIT_LOG_STREAM: &str = "audit_log";
pub const ANTI_BOT_STREAM: &str = "anti_bot";
pub const UNEXPECTED_RESPONSE_STREAM: &str = "unexpected_response_codes";
pub const BROKEN_LINKS_STREAM: &str = "broken_internal_links";

/// worker 行为选项
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub delay_between_page_loads: Duration,
    pub perform_header_check: bool,
    pub record_unexpected_response_codes: bool,
    pub check_for_broken_internal_links: bool,
    pub crawl_enabled: bool,
}

impl WorkerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            delay_between_page_loads: settings.delay_between_page_loads(),
            perform_header_check: settings.perform_header_check,
            record_unexpected_response_codes: settings.record_unexpected_response_codes,
            check_for_broken_internal_links: settings.check_for_broken_internal_links,
            crawl_enabled: settings.crawl_enabled(),
        }
    }
}

/// worker 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub jobs: usize,
    pub audited: usize,
    pub skipped_by_robots: usize,
    pub skipped_by_preflight: usize,
    pub load_failed: usize,
    pub blocked: usize,
    pub session_restarts: usize,
}

impl WorkerSummary {
    fn record(&mut self, state: JobState) {
        self.jobs += 1;
        match state {
            JobState::Reported | JobState::Audited => self.audited += 1,
            JobState::SkippedByRobots => self.skipped_by_robots += 1,
            JobState::SkippedByPreflight => self.skipped_by_preflight += 1,
            JobState::LoadFailed => self.load_failed += 1,
            JobState::Blocked => self.blocked += 1,
            _ => {}
        }
    }
}

/// 审计 worker
///
/// 独占一个浏览器会话，循环从前沿取任务直到前沿耗尽或停止
pub struct AuditWorker {
    id: usize,
    frontier: Arc<Frontier>,
    dispatcher: Arc<AuditDispatcher>,
    launcher: Arc<dyn BrowserLauncher>,
    http: PreflightChecker,
    results: Arc<dyn ResultRepository>,
    progress: Arc<ProgressTracker>,
    options: WorkerOptions,
    session: Option<Box<dyn BrowserSession>>,
    summary: WorkerSummary,
}

impl AuditWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        frontier: Arc<Frontier>,
        dispatcher: Arc<AuditDispatcher>,
        launcher: Arc<dyn BrowserLauncher>,
        http: PreflightChecker,
        results: Arc<dyn ResultRepository>,
        progress: Arc<ProgressTracker>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            id,
            frontier,
            dispatcher,
            launcher,
            http,
            results,
            progress,
            options,
            session: None,
            summary: WorkerSummary {
                worker_id: id,
                ..Default::default()
            },
        }
    }

    /// 运行 worker 循环
    ///
    /// # 返回值
    ///
    /// 返回该 worker 的运行统计
    pub async fn run(mut self) -> WorkerSummary {
        info!("Audit worker {} started", self.id);

        while let Some(job) = self.frontier.next().await {
            let _claim = self.frontier.claim(&job);
            let job = Arc::new(job);
            let state = self.process(&job).await;
            self.summary.record(state);
        }

        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Worker {} failed to close browser session: {}", self.id, e);
            }
        }

        info!(
            "Audit worker {} finished after {} jobs",
            self.id, self.summary.jobs
        );
        self.summary
    }

    #[instrument(skip(self, job), fields(worker = self.id, job_id = job.id, url = %job.url, domain = %job.domain))]
    async fn process(&mut self, job: &Arc<PageJob>) -> JobState {
        let (state, links) = self.execute(job).await;

        let report = self.frontier.report(job, state, links).await;
        self.progress.grow(report.admitted);
        self.progress.shrink(report.dropped);

        metrics::counter!("audit_jobs_total", "state" => state.outcome_label()).increment(1);
        self.progress
            .record_completion(format!("[{}] {}", state.outcome_label(), job.url));
        state
    }

    async fn execute(&mut self, job: &Arc<PageJob>) -> (JobState, Vec<Url>) {
        let state = JobState::Queued;

        if !self.frontier.robots_allows(job).await {
            info!("Disallowed by robots.txt");
            return (advance(state, JobState::SkippedByRobots), Vec::new());
        }

        if !self.options.delay_between_page_loads.is_zero() {
            tokio::time::sleep(self.options.delay_between_page_loads).await;
        }

        if self.options.perform_header_check {
            let verdict = self.http.check(&job.url, job.allows_head).await;
            if let PreflightVerdict::Rejected {
                status,
                content_type,
                final_url,
                reason,
            } = &verdict
            {
                info!("Skipped by pre-flight check: {}", reason);
                if self.options.record_unexpected_response_codes {
                    let row = vec![
                        ("url".to_string(), job.url.clone()),
                        ("final_url".to_string(), final_url.clone()),
                        ("status".to_string(), status.to_string()),
                        ("content_type".to_string(), content_type.clone()),
                        ("reason".to_string(), reason.clone()),
                        ("organisation".to_string(), job.organisation.clone()),
                        ("sector".to_string(), job.sector.clone()),
                        ("base_url".to_string(), job.base_url.clone()),
                    ];
                    self.write_row(UNEXPECTED_RESPONSE_STREAM, &row);
                }
                return (advance(state, JobState::SkippedByPreflight), Vec::new());
            }
        }
        let state = advance(state, JobState::HeaderChecked);

        if let Err(error) = self.ensure_session().await {
            let viewport = first_viewport(job);
            self.write_outcome(&AuditOutcome::load_failed(
                job.clone(),
                viewport,
                error.to_string(),
            ));
            return (advance(state, JobState::LoadFailed), Vec::new());
        }

        self.write_row(AUDIT_LOG_STREAM, &audit_log_row(job));

        let (result, responsive) = match self.session.as_deref() {
            Some(session) => {
                let result = self.dispatcher.run_job(session, job).await;
                let responsive = match &result {
                    DispatchResult::LoadFailed { error, .. } => {
                        !error.is_session_fatal() && session.is_responsive().await
                    }
                    _ => true,
                };
                (result, responsive)
            }
            None => return (advance(state, JobState::LoadFailed), Vec::new()),
        };

        if !responsive {
            self.recycle_session().await;
        }

        match result {
            DispatchResult::Audited {
                outcomes,
                page_source,
                final_url,
            } => {
                let state = advance(state, JobState::Loaded);
                let state = advance(state, JobState::Audited);
                for outcome in &outcomes {
                    self.write_outcome(outcome);
                }

                let links = if self.options.crawl_enabled {
                    let page_url = Url::parse(&final_url)
                        .or_else(|_| Url::parse(&job.url))
                        .ok();
                    page_url
                        .map(|url| extract_links(&page_source, &url))
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };

                if self.options.check_for_broken_internal_links {
                    self.check_internal_links(job, &page_source, &final_url).await;
                }

                (advance(state, JobState::Reported), links)
            }
            DispatchResult::LoadFailed {
                completed,
                outcome,
                error: _,
            } => {
                for outcome in completed.iter().chain(std::iter::once(&outcome)) {
                    self.write_outcome(outcome);
                }
                (advance(state, JobState::LoadFailed), Vec::new())
            }
            DispatchResult::Blocked { service, viewport } => {
                let state = advance(state, JobState::Loaded);
                let row = vec![
                    ("url".to_string(), job.url.clone()),
                    ("base_url".to_string(), job.base_url.clone()),
                    ("organisation".to_string(), job.organisation.clone()),
                    ("sector".to_string(), job.sector.clone()),
                    ("viewport".to_string(), viewport.name.clone()),
                    ("blocked_by".to_string(), service.to_string()),
                ];
                self.write_row(ANTI_BOT_STREAM, &row);
                (advance(state, JobState::Blocked), Vec::new())
            }
        }
    }

    async fn check_internal_links(&self, job: &PageJob, page_source: &str, final_url: &str) {
        let Ok(page_url) = Url::parse(final_url).or_else(|_| Url::parse(&job.url)) else {
            return;
        };
        let links: Vec<Url> = extract_links(page_source, &page_url)
            .into_iter()
            .filter(|link| is_same_domain(link, &page_url))
            .filter(|link| matches!(link.scheme(), "http" | "https"))
            .collect();

        for link in links {
            let status = self.http.status_of(link.as_str(), job.allows_head).await;
            let broken = status.map(|code| code >= 400).unwrap_or(true);
            if broken {
                let row = vec![
                    ("url".to_string(), job.url.clone()),
                    ("broken_link".to_string(), link.to_string()),
                    (
                        "status".to_string(),
                        status.map(|s| s.to_string()).unwrap_or_default(),
                    ),
                    ("organisation".to_string(), job.organisation.clone()),
                    ("sector".to_string(), job.sector.clone()),
                ];
                self.write_row(BROKEN_LINKS_STREAM, &row);
            }
        }
    }

    async fn ensure_session(&mut self) -> Result<(), BrowserError> {
        if self.session.is_some() {
            return Ok(());
        }
        match self.launcher.launch(self.id).await {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                error!("Worker {} could not launch browser: {}", self.id, e);
                Err(e)
            }
        }
    }

    /// 关闭失效的会话并立即重建
    async fn recycle_session(&mut self) {
        warn!("Worker {} recycling unresponsive browser session", self.id);
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close unresponsive session: {}", e);
            }
        }
        self.summary.session_restarts += 1;
        metrics::counter!("browser_session_restarts_total").increment(1);
        // A failed relaunch is retried lazily by the next job
        let _ = self.ensure_session().await;
    }

    fn write_outcome(&self, outcome: &AuditOutcome) {
        metrics::counter!(
            "audit_outcomes_total",
            "plugin" => outcome.plugin_name.clone(),
            "success" => outcome.success.to_string()
        )
        .increment(1);
        if let Err(e) = self.results.append_outcome(outcome) {
            error!(
                plugin = %outcome.plugin_name,
                viewport = %outcome.viewport.name,
                "Failed to write audit outcome: {}",
                e
            );
        }
    }

    fn write_row(&self, stream: &str, row: &ResultRow) {
        if let Err(e) = self.results.append_row(stream, row) {
            error!("Failed to write {} row: {}", stream, e);
        }
    }
}

fn advance(state: JobState, next: JobState) -> JobState {
    match state.transition(next) {
        Ok(state) => state,
        Err(e) => {
            warn!("{}", e);
            next
        }
    }
}

fn first_viewport(job: &PageJob) -> Viewport {
    job.viewports
        .first()
        .cloned()
        .unwrap_or_else(|| Viewport::new("unknown", 0, 0))
}

fn audit_log_row(job: &PageJob) -> ResultRow {
    vec![
        ("page_id".to_string(), job.id.to_string()),
        ("url".to_string(), job.url.clone()),
        ("base_url".to_string(), job.base_url.clone()),
        ("organisation".to_string(), job.organisation.clone()),
        ("sector".to_string(), job.sector.clone()),
        ("started_at".to_string(), Utc::now().to_rfc3339()),
    ]
}
