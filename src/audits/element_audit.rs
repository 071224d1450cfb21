// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::json;

use super::traits::{AuditError, AuditPlugin, PageContext};
use crate::config::settings::AuditPluginSettings;
use crate::domain::models::audit_outcome::Fields;

pub const ELEMENT_AUDIT: &str = "element_audit";

/// 选择器配置字段
pub const SELECTOR_OPTION: &str = "target_element_css_selector";

const SAMPLE_LIMIT: usize = 500;

/// 元素审计
///
/// 统计渲染后页面中匹配 CSS 选择器的元素数量，并记录首个元素的 HTML 片段
pub struct ElementAudit;

#[async_trait]
impl AuditPlugin for ElementAudit {
    fn name(&self) -> &'static str {
        ELEMENT_AUDIT
    }

    async fn run(
        &self,
        page: &PageContext<'_>,
        settings: &AuditPluginSettings,
    ) -> Result<Fields, AuditError> {
        let selector_text = settings.option_str(SELECTOR_OPTION).ok_or_else(|| {
            AuditError::InvalidConfig(format!("missing '{}'", SELECTOR_OPTION))
        })?;

        let html = page.session.content().await?;
        let selector = Selector::parse(selector_text).map_err(|e| {
            AuditError::InvalidConfig(format!("invalid selector '{}': {}", selector_text, e))
        })?;
        let (count, sample) = match_elements(&html, &selector);

        Ok(vec![
            ("page_title".to_string(), json!(page.metadata.title)),
            ("selector".to_string(), json!(selector_text)),
            ("element_count".to_string(), json!(count)),
            ("first_element_html".to_string(), json!(sample)),
        ])
    }
}

fn match_elements(html: &str, selector: &Selector) -> (usize, String) {
    let document = Html::parse_document(html);
    let mut matches = document.select(selector);
    let sample = matches
        .next()
        .map(|element| truncate(&element.html(), SAMPLE_LIMIT))
        .unwrap_or_default();
    let count = if sample.is_empty() { 0 } else { 1 + matches.count() };
    (count, sample)
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}
