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

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::domain::models::page_job::Viewport;
use crate::utils::errors::ConfigurationError;

/// 默认审计插件名称，必须始终启用
pub const DEFAULT_AUDIT: &str = "default_audit";

/// 审计运行配置
///
/// 包含爬取范围、并发、时序、种子表位置以及插件链等所有配置项。
/// 未出现在配置源中的字段取 `Settings::default()` 中的值。
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_audit_plugins"))]
pub struct Settings {
    /// 审计名称，用于结果目录命名
    pub audit_name: String,
    /// 每个域名最多追加的发现链接数（不含种子）
    pub max_links_per_domain: usize,
    /// 并发 worker 数量
    #[validate(range(min = 1, max = 256))]
    pub thread_count: usize,
    /// 是否以无头模式运行浏览器
    pub headless: bool,
    /// 浏览器可执行文件路径
    pub chrome_executable: Option<String>,
    /// 完整 User-Agent
    pub user_agent: String,
    /// robots.txt 匹配使用的产品标识
    ///
    /// 只能由字母、`_` 与 `-` 组成，否则 robots.txt 中的 `User-agent` 行无法与之匹配
    #[validate(custom(function = "validate_product_token"))]
    pub user_agent_product_token: String,
    pub follow_robots_txt: bool,
    pub only_allow_https: bool,
    pub perform_header_check: bool,
    pub nocrawl_mode: bool,
    pub shuffle_base_urls: bool,
    pub check_for_broken_internal_links: bool,
    pub record_unexpected_response_codes: bool,
    pub force_open_details_elements: bool,
    /// 组织名称子串过滤，空表示不过滤
    pub filter_to_organisations: Vec<String>,
    /// URL 子串过滤，空表示不过滤
    pub filter_to_domains: Vec<String>,
    /// 视口名称到尺寸的映射
    pub viewport_sizes: BTreeMap<String, ViewportSize>,
    /// 页面加载之间的间隔（秒）
    #[validate(range(min = 0.0, max = 600.0))]
    pub delay_between_page_loads: f64,
    /// 视口切换之间的间隔（秒）
    #[validate(range(min = 0.0, max = 600.0))]
    pub delay_between_viewports: f64,
    /// 页面加载完成后的等待时间（秒）
    #[validate(range(min = 0.0, max = 600.0))]
    pub delay_after_page_load: f64,
    /// 单个脚本执行超时（秒）
    #[validate(range(min = 1, max = 3600))]
    pub script_timeout: u64,
    /// 页面加载超时（秒）
    #[validate(range(min = 1, max = 3600))]
    pub page_load_timeout: u64,
    /// 预检 HTTP 请求超时（秒）
    #[validate(range(min = 1, max = 600))]
    pub header_check_timeout: u64,
    pub base_urls_crawl_path: String,
    pub base_urls_nocrawl_path: String,
    /// 不支持 HEAD 请求的站点列表目录，空字符串表示不使用
    pub base_urls_nohead_path: String,
    pub results_path: String,
    /// 状态服务监听地址，未设置时不启动
    pub status_listen_addr: Option<String>,
    /// 插件名称到插件配置的映射
    pub audit_plugins: BTreeMap<String, AuditPluginSettings>,
}

/// 视口尺寸
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// 单个审计插件的配置
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AuditPluginSettings {
    #[serde(default)]
    pub enabled: bool,
    /// 限定插件只在该视口运行，未设置时在所有视口运行
    #[serde(default)]
    pub viewport_to_test: Option<String>,
    /// 插件自定义字段
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl AuditPluginSettings {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// 判断插件是否应在指定视口运行
    pub fn runs_at(&self, viewport_name: &str) -> bool {
        match &self.viewport_to_test {
            Some(name) => name == viewport_name,
            None => true,
        }
    }

    /// 读取字符串类型的插件字段
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut viewport_sizes = BTreeMap::new();
        viewport_sizes.insert(
            "small".to_string(),
            ViewportSize {
                width: 320,
                height: 450,
            },
        );
        viewport_sizes.insert(
            "medium".to_string(),
            ViewportSize {
                width: 1280,
                height: 800,
            },
        );

        let mut audit_plugins = BTreeMap::new();
        audit_plugins.insert(DEFAULT_AUDIT.to_string(), AuditPluginSettings::enabled());

        Self {
            audit_name: "audit".to_string(),
            max_links_per_domain: 10,
            thread_count: 2,
            headless: true,
            chrome_executable: None,
            user_agent: "Mozilla/5.0 (compatible; accessibility-crawler/0.1)".to_string(),
            user_agent_product_token: "accessibility-crawler".to_string(),
            follow_robots_txt: true,
            only_allow_https: false,
            perform_header_check: true,
            nocrawl_mode: false,
            shuffle_base_urls: true,
            check_for_broken_internal_links: false,
            record_unexpected_response_codes: true,
            force_open_details_elements: true,
            filter_to_organisations: Vec::new(),
            filter_to_domains: Vec::new(),
            viewport_sizes,
            delay_between_page_loads: 0.0,
            delay_between_viewports: 0.0,
            delay_after_page_load: 1.0,
            script_timeout: 15,
            page_load_timeout: 30,
            header_check_timeout: 10,
            base_urls_crawl_path: "./base_urls/crawl".to_string(),
            base_urls_nocrawl_path: "./base_urls/nocrawl".to_string(),
            base_urls_nohead_path: "./base_urls/nohead".to_string(),
            results_path: "./results".to_string(),
            status_listen_addr: None,
            audit_plugins,
        }
    }
}

impl Settings {
    /// 从配置文件与环境变量加载配置
    ///
    /// 配置名称取第一个命令行参数，其次是 `A11Y_CONFIG`
    ///
    /// # 返回值
    ///
    /// * `Ok(Settings)` - 成功加载并通过校验的配置
    /// * `Err(ConfigurationError)` - 加载或校验失败
    pub fn new() -> Result<Self, ConfigurationError> {
        let name = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("A11Y_CONFIG").ok());
        Self::load(name.as_deref())
    }

    /// 按名称加载配置
    ///
    /// 依次叠加 `config/default`、`config/{name}`（或显式路径）以及 `A11Y__*` 环境变量
    pub fn load(name: Option<&str>) -> Result<Self, ConfigurationError> {
        let mut builder =
            Config::builder().add_source(File::with_name("config/default").required(false));

        if let Some(name) = name {
            let path = if name.contains('/') || name.contains('.') {
                name.to_string()
            } else {
                format!("config/{}", name)
            };
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("A11Y")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 按宽度升序排列的视口列表
    pub fn viewports(&self) -> Vec<Viewport> {
        let mut viewports: Vec<Viewport> = self
            .viewport_sizes
            .iter()
            .map(|(name, size)| Viewport::new(name.clone(), size.width, size.height))
            .collect();
        viewports.sort_by(|a, b| {
            (a.width, a.height, &a.name).cmp(&(b.width, b.height, &b.name))
        });
        viewports
    }

    /// 实际生效的 User-Agent，附带产品标识以便站点识别
    pub fn effective_user_agent(&self) -> String {
        if self.user_agent.contains(&self.user_agent_product_token) {
            self.user_agent.clone()
        } else {
            format!("{} {}", self.user_agent, self.user_agent_product_token)
        }
    }

    /// 是否追加页面中发现的链接
    pub fn crawl_enabled(&self) -> bool {
        !self.nocrawl_mode && self.max_links_per_domain > 0
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout)
    }

    pub fn header_check_timeout(&self) -> Duration {
        Duration::from_secs(self.header_check_timeout)
    }

    pub fn delay_between_page_loads(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_page_loads)
    }

    pub fn delay_between_viewports(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_viewports)
    }

    pub fn delay_after_page_load(&self) -> Duration {
        Duration::from_secs_f64(self.delay_after_page_load)
    }
}

fn validate_product_token(token: &str) -> Result<(), ValidationError> {
    let valid = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("user_agent_product_token").with_message(
            format!(
                "product token '{}' may only contain letters, '_' and '-'",
                token
            )
            .into(),
        ))
    }
}

fn validate_audit_plugins(settings: &Settings) -> Result<(), ValidationError> {
    if settings.viewport_sizes.is_empty() {
        return Err(ValidationError::new("viewport_sizes")
            .with_message("at least one viewport size must be configured".into()));
    }

    for (name, size) in &settings.viewport_sizes {
        if size.width == 0 || size.height == 0 {
            return Err(ValidationError::new("viewport_sizes")
                .with_message(format!("viewport '{}' has a zero dimension", name).into()));
        }
    }

    for (name, plugin) in &settings.audit_plugins {
        if let Some(viewport) = &plugin.viewport_to_test {
            if !settings.viewport_sizes.contains_key(viewport) {
                return Err(ValidationError::new("viewport_to_test").with_message(
                    format!("plugin '{}' references unknown viewport '{}'", name, viewport).into(),
                ));
            }
        }
    }

    match settings.audit_plugins.get(DEFAULT_AUDIT) {
        Some(plugin) if plugin.enabled => Ok(()),
        _ => Err(ValidationError::new("audit_plugins")
            .with_message(format!("'{}' must be enabled", DEFAULT_AUDIT).into())),
    }
}
