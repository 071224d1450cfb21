// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::audits::anti_bot::{self, BlockingService};
use crate::audits::default_audit::DefaultAudit;
use crate::audits::registry::{AuditChain, RegisteredPlugin};
use crate::audits::traits::{PageContext, PageMetadata};
use crate::config::settings::Settings;
use crate::domain::models::audit_outcome::{AuditErrorKind, AuditOutcome};
use crate::domain::models::page_job::{PageJob, Viewport};
use crate::engines::traits::{BrowserError, BrowserSession};

/// 强制展开所有 `<details>` 元素，返回展开的数量
const OPEN_DETAILS_SCRIPT: &str = r#"(() => {
    const closed = document.querySelectorAll('details:not([open])');
    closed.forEach((element) => element.setAttribute('open', ''));
    return closed.length;
})()"#;

/// 审计分发配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub page_load_timeout: Duration,
    pub delay_after_page_load: Duration,
    pub delay_between_viewports: Duration,
    pub force_open_details: bool,
}

impl DispatcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            page_load_timeout: settings.page_load_timeout(),
            delay_after_page_load: settings.delay_after_page_load(),
            delay_between_viewports: settings.delay_between_viewports(),
            force_open_details: settings.force_open_details_elements,
        }
    }
}

/// 单个任务的审计结果
#[derive(Debug)]
pub enum DispatchResult {
    /// 所有视口均完成审计
    Audited {
        outcomes: Vec<AuditOutcome>,
        /// 最后一个视口下的渲染后源码
        page_source: String,
        final_url: String,
    },
    /// 某个视口加载失败，任务放弃
    LoadFailed {
        /// 失败前已完成视口的结果
        completed: Vec<AuditOutcome>,
        outcome: AuditOutcome,
        error: BrowserError,
    },
    /// 页面为反爬拦截页
    Blocked {
        service: BlockingService,
        viewport: Viewport,
    },
}

/// 审计分发器
///
/// 对一个任务依次处理每个视口：调整尺寸、导航、等待、展开 details、
/// 反爬检测，然后先运行 `DefaultAudit` 再运行其余匹配该视口的插件
pub struct AuditDispatcher {
    chain: Arc<AuditChain>,
    config: DispatcherConfig,
}

impl AuditDispatcher {
    pub fn new(chain: Arc<AuditChain>, config: DispatcherConfig) -> Self {
        Self { chain, config }
    }

    /// 对任务执行完整的视口循环
    ///
    /// # 参数
    ///
    /// * `session` - worker 独占的浏览器会话
    /// * `job` - 待审计的任务
    ///
    /// # 返回值
    ///
    /// 返回审计结果；插件失败不会中断循环，只有导航失败会提前结束
    pub async fn run_job(&self, session: &dyn BrowserSession, job: &Arc<PageJob>) -> DispatchResult {
        let mut outcomes = Vec::new();
        let mut page_source = String::new();
        let mut final_url = job.url.clone();

        for (index, viewport) in job.viewports.iter().enumerate() {
            if index > 0 && !self.config.delay_between_viewports.is_zero() {
                tokio::time::sleep(self.config.delay_between_viewports).await;
            }

            if let Err(error) = self.load(session, job, viewport).await {
                warn!(
                    url = %job.url,
                    domain = %job.domain,
                    viewport = %viewport.name,
                    "Page load failed: {}",
                    error
                );
                return DispatchResult::LoadFailed {
                    completed: outcomes,
                    outcome: AuditOutcome::load_failed(
                        job.clone(),
                        viewport.clone(),
                        error.to_string(),
                    ),
                    error,
                };
            }

            page_source = match session.content().await {
                Ok(source) => source,
                Err(error) => {
                    warn!(url = %job.url, viewport = %viewport.name, "Failed to read page source: {}", error);
                    String::new()
                }
            };
            if let Some(service) = anti_bot::detect(&page_source) {
                warn!(url = %job.url, domain = %job.domain, "Blocked by {}", service);
                return DispatchResult::Blocked {
                    service,
                    viewport: viewport.clone(),
                };
            }

            let metadata = match DefaultAudit::collect(session, viewport).await {
                Ok(metadata) => metadata,
                Err(error) => {
                    warn!(url = %job.url, viewport = %viewport.name, "Failed to collect page metadata: {}", error);
                    PageMetadata {
                        title: String::new(),
                        url: job.url.clone(),
                        viewport: viewport.clone(),
                    }
                }
            };
            if !metadata.url.is_empty() {
                final_url = metadata.url.clone();
            }

            let page = PageContext {
                job,
                viewport,
                metadata: &metadata,
                session,
            };

            let default_audit = self.chain.default_audit();
            outcomes.push(self.run_plugin(default_audit, &page).await);
            for plugin in self.chain.plugins_for(&viewport.name) {
                outcomes.push(self.run_plugin(plugin, &page).await);
            }
        }

        DispatchResult::Audited {
            outcomes,
            page_source,
            final_url,
        }
    }

    async fn load(
        &self,
        session: &dyn BrowserSession,
        job: &PageJob,
        viewport: &Viewport,
    ) -> Result<(), BrowserError> {
        session.set_viewport(viewport).await?;
        session
            .navigate(&job.url, self.config.page_load_timeout)
            .await?;

        if !self.config.delay_after_page_load.is_zero() {
            tokio::time::sleep(self.config.delay_after_page_load).await;
        }

        if self.config.force_open_details {
            match session.evaluate(OPEN_DETAILS_SCRIPT).await {
                Ok(opened) => debug!("Opened {} details elements", opened),
                Err(e) => warn!(url = %job.url, "Failed to open details elements: {}", e),
            }
        }
        Ok(())
    }

    async fn run_plugin(&self, plugin: &RegisteredPlugin, page: &PageContext<'_>) -> AuditOutcome {
        let job = page.job.clone();
        let result = AssertUnwindSafe(plugin.plugin.run(page, &plugin.settings))
            .catch_unwind()
            .await;
        let result = match result {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    url = %page.job.url,
                    domain = %page.job.domain,
                    plugin = plugin.name(),
                    viewport = %page.viewport.name,
                    "Audit plugin panicked: {}",
                    message
                );
                return AuditOutcome::failed(
                    plugin.name(),
                    job,
                    page.viewport.clone(),
                    AuditErrorKind::PluginFailed,
                    format!("plugin panicked: {}", message),
                );
            }
        };

        match result {
            Ok(fields) => AuditOutcome::succeeded(plugin.name(), job, page.viewport.clone(), fields),
            Err(error) => {
                warn!(
                    url = %page.job.url,
                    domain = %page.job.domain,
                    plugin = plugin.name(),
                    viewport = %page.viewport.name,
                    "Audit plugin failed: {}",
                    error
                );
                AuditOutcome::failed(
                    plugin.name(),
                    job,
                    page.viewport.clone(),
                    error.kind(),
                    error.to_string(),
                )
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
