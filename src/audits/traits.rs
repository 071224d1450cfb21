// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::settings::AuditPluginSettings;
use crate::domain::models::audit_outcome::{AuditErrorKind, Fields};
use crate::domain::models::page_job::{PageJob, Viewport};
use crate::engines::traits::{BrowserError, BrowserSession};

/// 审计插件错误类型
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),

    #[error("插件配置无效: {0}")]
    InvalidConfig(String),

    #[error("执行失败: {0}")]
    Execution(String),
}

impl AuditError {
    /// 映射到结果行中的失败分类
    pub fn kind(&self) -> AuditErrorKind {
        match self {
            AuditError::Browser(BrowserError::Timeout(_)) => AuditErrorKind::ScriptTimeout,
            AuditError::Browser(e) if e.is_session_fatal() => AuditErrorKind::SessionLost,
            _ => AuditErrorKind::PluginFailed,
        }
    }
}

/// 由 `DefaultAudit` 在每轮审计开始时收集的页面元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    /// 跟随重定向后的实际URL
    pub url: String,
    pub viewport: Viewport,
}

/// 插件运行时可见的页面上下文
///
/// 插件只能看到当前页面与任务身份，看不到前沿状态
pub struct PageContext<'a> {
    pub job: &'a Arc<PageJob>,
    pub viewport: &'a Viewport,
    pub metadata: &'a PageMetadata,
    pub session: &'a dyn BrowserSession,
}

/// 审计插件
#[async_trait]
pub trait AuditPlugin: Send + Sync {
    /// 插件名称，同时作为结果流名称
    fn name(&self) -> &'static str;

    /// 对当前页面执行审计
    ///
    /// # 参数
    ///
    /// * `page` - 页面上下文
    /// * `settings` - 插件配置
    ///
    /// # 返回值
    ///
    /// * `Ok(Fields)` - 有序的结果字段
    /// * `Err(AuditError)` - 审计失败，仅影响本插件
    async fn run(
        &self,
        page: &PageContext<'_>,
        settings: &AuditPluginSettings,
    ) -> Result<Fields, AuditError>;
}
