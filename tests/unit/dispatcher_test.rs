// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 审计分发器测试模块
///
/// 直接驱动 `AuditDispatcher`，验证视口循环、details 展开与失败时保留已完成结果
#[cfg(test)]
mod tests {
    use a11y_crawler::audits::registry::AuditPluginRegistry;
    use a11y_crawler::config::settings::{Settings, DEFAULT_AUDIT};
    use a11y_crawler::domain::models::audit_outcome::{AuditErrorKind, LOAD_FAILED_STREAM};
    use a11y_crawler::domain::models::page_job::{PageJob, Viewport};
    use a11y_crawler::engines::traits::{BrowserError, BrowserSession};
    use a11y_crawler::workers::dispatcher::{AuditDispatcher, DispatchResult, DispatcherConfig};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// 在指定视口导航失败的会话，记录执行过的脚本
    struct ScriptedSession {
        fail_at: Option<&'static str>,
        viewport: Mutex<String>,
        scripts: Mutex<Vec<String>>,
    }

    impl ScriptedSession {
        fn new(fail_at: Option<&'static str>) -> Self {
            Self {
                fail_at,
                viewport: Mutex::new(String::new()),
                scripts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn set_viewport(&self, viewport: &Viewport) -> Result<(), BrowserError> {
            *self.viewport.lock() = viewport.name.clone();
            Ok(())
        }

        async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
            if self.fail_at == Some(self.viewport.lock().as_str()) {
                return Err(BrowserError::Timeout(timeout));
            }
            assert_eq!(url, "https://example.com/about");
            Ok(())
        }

        async fn title(&self) -> Result<String, BrowserError> {
            Ok("  About us \n".to_string())
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            Ok("https://example.com/about-us".to_string())
        }

        async fn content(&self) -> Result<String, BrowserError> {
            Ok("<html><body><details><summary>More</summary></details></body></html>".to_string())
        }

        async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
            self.scripts.lock().push(script.to_string());
            Ok(serde_json::json!(1))
        }

        async fn is_responsive(&self) -> bool {
            true
        }

        async fn close(&self) -> Result<(), BrowserError> {
            Ok(())
        }
    }

    fn settings() -> Settings {
        Settings {
            delay_after_page_load: 0.0,
            ..Settings::default()
        }
    }

    fn job(settings: &Settings) -> Arc<PageJob> {
        Arc::new(PageJob {
            id: 11,
            url: "https://example.com/about".to_string(),
            domain: "example.com".to_string(),
            base_url: "https://example.com/".to_string(),
            organisation: "Example Org".to_string(),
            sector: "Health".to_string(),
            viewports: Arc::new(settings.viewports()),
            attempt: 1,
            allows_head: true,
        })
    }

    fn dispatcher(settings: &Settings) -> AuditDispatcher {
        let chain = AuditPluginRegistry::with_builtins()
            .resolve(&settings.audit_plugins)
            .unwrap();
        AuditDispatcher::new(Arc::new(chain), DispatcherConfig::from_settings(settings))
    }

    #[tokio::test]
    async fn test_every_viewport_is_audited() {
        let settings = settings();
        let session = ScriptedSession::new(None);

        let result = dispatcher(&settings)
            .run_job(&session, &job(&settings))
            .await;

        match result {
            DispatchResult::Audited {
                outcomes,
                final_url,
                page_source,
            } => {
                let viewports: Vec<&str> =
                    outcomes.iter().map(|o| o.viewport.name.as_str()).collect();
                assert_eq!(viewports, vec!["small", "medium"]);
                assert!(outcomes.iter().all(|o| o.plugin_name == DEFAULT_AUDIT && o.success));
                assert_eq!(outcomes[0].audit_id(), "11_small");
                assert_eq!(final_url, "https://example.com/about-us");
                assert!(page_source.contains("<details>"));

                let row = outcomes[0].row();
                let title = row.iter().find(|(k, _)| k == "page_title").unwrap();
                assert_eq!(title.1, "About us");
            }
            other => panic!("expected audited result, got {:?}", other),
        }
        // Details are forced open once per viewport
        assert_eq!(session.scripts.lock().len(), 2);
        assert!(session.scripts.lock()[0].contains("setAttribute('open'"));
    }

    #[tokio::test]
    async fn test_details_left_closed_when_disabled() {
        let settings = Settings {
            force_open_details_elements: false,
            ..settings()
        };
        let session = ScriptedSession::new(None);

        dispatcher(&settings)
            .run_job(&session, &job(&settings))
            .await;

        assert!(session.scripts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_completed_viewports() {
        let settings = settings();
        let session = ScriptedSession::new(Some("medium"));

        let result = dispatcher(&settings)
            .run_job(&session, &job(&settings))
            .await;

        match result {
            DispatchResult::LoadFailed {
                completed,
                outcome,
                error,
            } => {
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].viewport.name, "small");
                assert_eq!(outcome.plugin_name, LOAD_FAILED_STREAM);
                assert_eq!(outcome.viewport.name, "medium");
                assert_eq!(outcome.error_kind, Some(AuditErrorKind::LoadFailed));
                assert!(matches!(error, BrowserError::Timeout(_)));
                assert!(!error.is_session_fatal());
            }
            other => panic!("expected load failure, got {:?}", other),
        }
    }
}
