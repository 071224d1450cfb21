// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::domain::models::page_job::{PageJob, Viewport};

/// 有序的插件输出字段
pub type Fields = Vec<(String, serde_json::Value)>;

/// 页面加载失败时使用的结果流名称
pub const LOAD_FAILED_STREAM: &str = "load_failed";

/// 失败原因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditErrorKind {
    /// 页面加载失败或超时
    LoadFailed,
    /// 插件执行失败
    PluginFailed,
    /// 脚本执行超时
    ScriptTimeout,
    /// 浏览器会话失效
    SessionLost,
}

impl fmt::Display for AuditErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AuditErrorKind::LoadFailed => "load_failed",
            AuditErrorKind::PluginFailed => "plugin_failed",
            AuditErrorKind::ScriptTimeout => "script_timeout",
            AuditErrorKind::SessionLost => "session_lost",
        };
        write!(f, "{}", s)
    }
}

/// 单次插件调用的结果
///
/// 追加到对应插件的结果流后不再修改
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub plugin_name: String,
    pub job: Arc<PageJob>,
    pub viewport: Viewport,
    pub fields: Fields,
    pub success: bool,
    pub error_kind: Option<AuditErrorKind>,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl AuditOutcome {
    /// 构造成功结果
    pub fn succeeded(
        plugin_name: impl Into<String>,
        job: Arc<PageJob>,
        viewport: Viewport,
        fields: Fields,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            job,
            viewport,
            fields,
            success: true,
            error_kind: None,
            error_message: None,
            completed_at: Utc::now(),
        }
    }

    /// 构造失败结果
    pub fn failed(
        plugin_name: impl Into<String>,
        job: Arc<PageJob>,
        viewport: Viewport,
        kind: AuditErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            job,
            viewport,
            fields: Vec::new(),
            success: false,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            completed_at: Utc::now(),
        }
    }

    /// 页面加载失败的专用结果，写入 `load_failed` 流
    pub fn load_failed(job: Arc<PageJob>, viewport: Viewport, message: impl Into<String>) -> Self {
        Self::failed(
            LOAD_FAILED_STREAM,
            job,
            viewport,
            AuditErrorKind::LoadFailed,
            message,
        )
    }

    /// 审计编号：`{任务编号}_{视口}`
    pub fn audit_id(&self) -> String {
        format!("{}_{}", self.job.id, self.viewport.name)
    }

    /// 转换为结果行
    ///
    /// 固定列在前（任务身份、组织、视口、成败），插件字段按插件给出的顺序追加
    pub fn row(&self) -> Vec<(String, String)> {
        let mut row = vec![
            ("audit_id".to_string(), self.audit_id()),
            ("page_id".to_string(), self.job.id.to_string()),
            ("organisation".to_string(), self.job.organisation.clone()),
            ("sector".to_string(), self.job.sector.clone()),
            ("base_url".to_string(), self.job.base_url.clone()),
            ("url".to_string(), self.job.url.clone()),
            ("viewport".to_string(), self.viewport.name.clone()),
            ("viewport_size".to_string(), self.viewport.size_label()),
            ("success".to_string(), self.success.to_string()),
            (
                "error_kind".to_string(),
                self.error_kind.map(|k| k.to_string()).unwrap_or_default(),
            ),
            (
                "error".to_string(),
                self.error_message.clone().unwrap_or_default(),
            ),
            ("completed_at".to_string(), self.completed_at.to_rfc3339()),
        ];
        for (key, value) in &self.fields {
            if row.iter().any(|(existing, _)| existing == key) {
                continue;
            }
            row.push((key.clone(), cell_text(value)));
        }
        row
    }
}

/// 将字段值转换为单元格文本；字符串不带引号
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
