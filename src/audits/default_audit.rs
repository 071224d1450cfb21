// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde_json::json;

use super::traits::{AuditError, AuditPlugin, PageContext, PageMetadata};
use crate::config::settings::{AuditPluginSettings, DEFAULT_AUDIT};
use crate::domain::models::audit_outcome::Fields;
use crate::domain::models::page_job::Viewport;
use crate::engines::traits::BrowserSession;

/// 默认审计
///
/// 每轮审计最先运行，收集页面元数据供后续插件使用，并为每个页面/视口写一行记录
pub struct DefaultAudit;

impl DefaultAudit {
    /// 收集页面元数据
    pub async fn collect(
        session: &dyn BrowserSession,
        viewport: &Viewport,
    ) -> Result<PageMetadata, AuditError> {
        let title = session.title().await?;
        let url = session.current_url().await?;
        Ok(PageMetadata {
            title: title.trim().to_string(),
            url,
            viewport: viewport.clone(),
        })
    }
}

#[async_trait]
impl AuditPlugin for DefaultAudit {
    fn name(&self) -> &'static str {
        DEFAULT_AUDIT
    }

    async fn run(
        &self,
        page: &PageContext<'_>,
        _settings: &AuditPluginSettings,
    ) -> Result<Fields, AuditError> {
        Ok(vec![
            ("page_title".to_string(), json!(page.metadata.title)),
            ("final_url".to_string(), json!(page.metadata.url)),
        ])
    }
}
