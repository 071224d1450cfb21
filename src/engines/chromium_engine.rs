// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::traits::{BrowserError, BrowserLauncher, BrowserSession};
use crate::config::settings::Settings;
use crate::domain::models::page_job::Viewport;

/// 响应性探测超时
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 基于 chromiumoxide 的浏览器启动器
///
/// 每次调用 `launch` 都会启动独立的浏览器进程，不在 worker 之间共享
pub struct ChromiumLauncher {
    headless: bool,
    executable: Option<String>,
    user_agent: String,
    script_timeout: Duration,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            headless: settings.headless,
            executable: settings.chrome_executable.clone(),
            user_agent: settings.effective_user_agent(),
            script_timeout: settings.script_timeout(),
            request_timeout: settings.page_load_timeout(),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.request_timeout);

        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--hide-scrollbars");

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, worker_id: usize) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Spawn a handler to process browser events
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };
        page.set_user_agent(self.user_agent.as_str())
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        info!("Worker {} launched browser session", worker_id);

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            page,
            handler: handler_task,
            script_timeout: self.script_timeout,
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// chromiumoxide 会话
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
    script_timeout: Duration,
}

fn session_error(e: impl std::fmt::Display) -> BrowserError {
    let message = e.to_string();
    if message.contains("channel closed") || message.contains("ConnectionClosed") {
        BrowserError::SessionLost(message)
    } else {
        BrowserError::Other(message)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), BrowserError> {
        let params = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            1.0,
            false,
        );
        self.page.execute(params).await.map_err(session_error)?;
        Ok(())
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        // goto waits for the load event
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => match session_error(e) {
                BrowserError::Other(message) => Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message,
                }),
                other => Err(other),
            },
            Err(_) => Err(BrowserError::Timeout(timeout)),
        }
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let title = self.page.get_title().await.map_err(session_error)?;
        Ok(title.unwrap_or_default())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let url = self.page.url().await.map_err(session_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(session_error)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        match tokio::time::timeout(self.script_timeout, self.page.evaluate(script)).await {
            Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(serde_json::Value::Null)),
            Ok(Err(e)) => match session_error(e) {
                BrowserError::Other(message) => Err(BrowserError::Script(message)),
                other => Err(other),
            },
            Err(_) => Err(BrowserError::Timeout(self.script_timeout)),
        }
    }

    async fn is_responsive(&self) -> bool {
        if self.handler.is_finished() {
            return false;
        }
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, self.page.evaluate("1 + 1")).await,
            Ok(Ok(_))
        )
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Browser process wait failed: {}", e);
            }
        }
        self.handler.abort();
        Ok(())
    }
}
