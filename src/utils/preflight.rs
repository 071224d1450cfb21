// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 视为可审计的响应状态码
pub const ACCEPTED_STATUSES: [u16; 5] = [200, 301, 302, 307, 308];

/// 预检结果
#[derive(Debug, Clone, PartialEq)]
pub enum PreflightVerdict {
    /// 可以进入浏览器加载
    Accepted { status: u16, final_url: String },
    /// 状态码或内容类型不符合要求
    Rejected {
        status: u16,
        content_type: String,
        final_url: String,
        reason: String,
    },
    /// 传输层失败，按约定放行
    Unreachable { reason: String },
}

impl PreflightVerdict {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, PreflightVerdict::Rejected { .. })
    }
}

/// 页面预检器
///
/// 在启动浏览器之前用轻量的 HEAD（或 GET）请求确认目标是可达的 HTML 页面
#[derive(Clone)]
pub struct PreflightChecker {
    client: Client,
}

impl PreflightChecker {
    /// 创建预检器
    ///
    /// # 参数
    ///
    /// * `user_agent` - 请求使用的 User-Agent
    /// * `timeout` - 单次请求超时
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    /// 检查单个URL
    ///
    /// # 参数
    ///
    /// * `url` - 待检查的URL
    /// * `allows_head` - 站点是否接受 HEAD 请求；为 `false` 时直接使用 GET
    ///
    /// # 返回值
    ///
    /// 返回预检结论；只有 `Rejected` 会阻止页面进入浏览器
    #[instrument(skip(self))]
    pub async fn check(&self, url: &str, allows_head: bool) -> PreflightVerdict {
        let first_method = if allows_head { Method::HEAD } else { Method::GET };

        let response = match self.send(first_method.clone(), url).await {
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED
                && first_method == Method::HEAD =>
            {
                debug!("HEAD not allowed for {}, retrying with GET", url);
                match self.send(Method::GET, url).await {
                    Ok(response) => response,
                    Err(e) => return unreachable_verdict(url, e),
                }
            }
            Ok(response) => response,
            Err(e) => return unreachable_verdict(url, e),
        };

        classify(&response)
    }

    /// 仅返回状态码，用于内部链接可用性检查
    ///
    /// 与 `check` 一样，`allows_head` 为 `false` 的站点直接使用 GET
    pub async fn status_of(&self, url: &str, allows_head: bool) -> Option<u16> {
        if !allows_head {
            return self
                .send(Method::GET, url)
                .await
                .ok()
                .map(|r| r.status().as_u16());
        }
        match self.send(Method::HEAD, url).await {
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => self
                .send(Method::GET, url)
                .await
                .ok()
                .map(|r| r.status().as_u16()),
            Ok(response) => Some(response.status().as_u16()),
            Err(_) => None,
        }
    }

    async fn send(&self, method: Method, url: &str) -> Result<Response, reqwest::Error> {
        self.client.request(method, url).send().await
    }
}

fn unreachable_verdict(url: &str, error: reqwest::Error) -> PreflightVerdict {
    warn!("Pre-flight request to {} failed: {}", url, error);
    PreflightVerdict::Unreachable {
        reason: error.to_string(),
    }
}

fn classify(response: &Response) -> PreflightVerdict {
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !ACCEPTED_STATUSES.contains(&status) {
        return PreflightVerdict::Rejected {
            status,
            content_type,
            final_url,
            reason: format!("unexpected status {}", status),
        };
    }

    if !content_type.to_ascii_lowercase().starts_with("text/html") {
        return PreflightVerdict::Rejected {
            status,
            reason: format!("unexpected content type '{}'", content_type),
            content_type,
            final_url,
        };
    }

    PreflightVerdict::Accepted { status, final_url }
}
