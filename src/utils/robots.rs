// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::time::Duration;
use tracing::{debug, warn};

/// robots.txt 最大允许体积
pub const MAX_ROBOTS_BYTES: usize = 500 * 1024;

/// robots.txt 请求超时
pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

static TEXT_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^text/plain(?:;|$)").expect("Failed to compile content type regex"));

/// 单个站点解析后的 robots 规则
///
/// `body` 为 `None` 表示规则不可用，此时一律放行
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    body: Option<String>,
}

impl RobotsRules {
    /// 放行所有URL的规则
    pub fn permissive() -> Self {
        Self { body: None }
    }

    /// 由 robots.txt 文本构造规则
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    pub fn is_permissive(&self) -> bool {
        self.body.is_none()
    }

    /// 判断给定 User-Agent 产品标识是否允许访问 URL
    ///
    /// 最具体（最长）的匹配规则生效，由 `robotstxt` 实现
    pub fn allows(&self, url: &str, user_agent_token: &str) -> bool {
        match &self.body {
            None => true,
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, user_agent_token, url)
            }
        }
    }
}

/// robots.txt 抓取器
///
/// 任何失败（超时、非 2xx、内容类型不符、体积超限）都返回放行规则
#[derive(Clone)]
pub struct RobotsFetcher {
    client: Client,
}

impl RobotsFetcher {
    /// 创建新的抓取器
    ///
    /// # 参数
    ///
    /// * `user_agent` - 请求时使用的完整 User-Agent
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(ROBOTS_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// 抓取 `{origin}/robots.txt` 并解析
    pub async fn fetch(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

        let response = match self.client.get(&robots_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {}: {}, treating as allow-all", robots_url, e);
                return RobotsRules::permissive();
            }
        };

        if !response.status().is_success() {
            debug!(
                "{} returned status {}, treating as allow-all",
                robots_url,
                response.status()
            );
            return RobotsRules::permissive();
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default().trim();
            if !TEXT_PLAIN.is_match(content_type) {
                warn!(
                    "{} has content type '{}', treating as allow-all",
                    robots_url, content_type
                );
                return RobotsRules::permissive();
            }
        }

        let declared_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_length.is_some_and(|len| len > MAX_ROBOTS_BYTES) {
            warn!("{} exceeds size limit, treating as allow-all", robots_url);
            return RobotsRules::permissive();
        }

        match response.bytes().await {
            Ok(bytes) if bytes.len() > MAX_ROBOTS_BYTES => {
                warn!("{} exceeds size limit, treating as allow-all", robots_url);
                RobotsRules::permissive()
            }
            Ok(bytes) => {
                debug!("Loaded {} ({} bytes)", robots_url, bytes.len());
                RobotsRules::from_body(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => {
                warn!("Failed to read {}: {}, treating as allow-all", robots_url, e);
                RobotsRules::permissive()
            }
        }
    }
}
