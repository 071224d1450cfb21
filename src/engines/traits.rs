// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::page_job::Viewport;

/// 浏览器错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    /// 浏览器启动失败
    #[error("Browser launch failed: {0}")]
    Launch(String),
    /// 页面导航失败
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    /// 操作超时
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// 脚本执行失败
    #[error("Script failed: {0}")]
    Script(String),
    /// 会话已失效（浏览器进程退出或连接断开）
    #[error("Session lost: {0}")]
    SessionLost(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl BrowserError {
    /// 判断错误是否意味着会话不可再用
    ///
    /// # 返回值
    ///
    /// 如果需要重建会话则返回true
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, BrowserError::SessionLost(_) | BrowserError::Launch(_))
    }
}

/// 浏览器会话
///
/// 每个 worker 独占一个会话，所有方法作用于同一个页面
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 调整视口尺寸
    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), BrowserError>;

    /// 导航到URL并等待加载完成
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// 当前页面标题
    async fn title(&self) -> Result<String, BrowserError>;

    /// 当前页面URL（跟随重定向后）
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// 渲染后的页面源码
    async fn content(&self) -> Result<String, BrowserError>;

    /// 执行脚本并返回其 JSON 结果
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// 会话是否仍可响应
    async fn is_responsive(&self) -> bool;

    /// 关闭会话并释放浏览器进程
    async fn close(&self) -> Result<(), BrowserError>;
}

/// 浏览器启动器
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// 启动一个新的会话
    async fn launch(&self, worker_id: usize) -> Result<Box<dyn BrowserSession>, BrowserError>;

    /// 启动器名称
    fn name(&self) -> &'static str;
}
