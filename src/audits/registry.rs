// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use super::default_audit::DefaultAudit;
use super::element_audit::ElementAudit;
use super::traits::AuditPlugin;
use crate::config::settings::{AuditPluginSettings, DEFAULT_AUDIT};
use crate::utils::errors::ConfigurationError;

/// 已启用的插件及其配置
#[derive(Clone)]
pub struct RegisteredPlugin {
    pub plugin: Arc<dyn AuditPlugin>,
    pub settings: AuditPluginSettings,
}

impl RegisteredPlugin {
    pub fn name(&self) -> &'static str {
        self.plugin.name()
    }

    pub fn runs_at(&self, viewport_name: &str) -> bool {
        self.settings.runs_at(viewport_name)
    }
}

/// 一次运行使用的插件链
///
/// `DefaultAudit` 始终排在最前，其余插件按名称排序
#[derive(Clone)]
pub struct AuditChain {
    default_audit: RegisteredPlugin,
    plugins: Vec<RegisteredPlugin>,
}

impl AuditChain {
    pub fn default_audit(&self) -> &RegisteredPlugin {
        &self.default_audit
    }

    /// 在指定视口运行的其他插件
    pub fn plugins_for<'a>(
        &'a self,
        viewport_name: &'a str,
    ) -> impl Iterator<Item = &'a RegisteredPlugin> + 'a {
        self.plugins.iter().filter(move |p| p.runs_at(viewport_name))
    }

    /// 所有插件名称（含默认审计）
    pub fn names(&self) -> Vec<&'static str> {
        std::iter::once(self.default_audit.name())
            .chain(self.plugins.iter().map(RegisteredPlugin::name))
            .collect()
    }
}

/// 审计插件注册表
///
/// 启动时构建，按名称查找插件实现
#[derive(Default)]
pub struct AuditPluginRegistry {
    plugins: HashMap<&'static str, Arc<dyn AuditPlugin>>,
}

impl AuditPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置插件
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DefaultAudit));
        registry.register(Arc::new(ElementAudit));
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn AuditPlugin>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    /// 根据配置解析插件链
    ///
    /// # 参数
    ///
    /// * `configured` - 插件名称到配置的映射
    ///
    /// # 返回值
    ///
    /// * `Ok(AuditChain)` - 已启用插件组成的插件链
    /// * `Err(ConfigurationError)` - 配置中出现未注册的插件
    pub fn resolve(
        &self,
        configured: &BTreeMap<String, AuditPluginSettings>,
    ) -> Result<AuditChain, ConfigurationError> {
        let lookup = |name: &str| {
            self.plugins
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigurationError::UnknownPlugin(name.to_string()))
        };

        let default_audit = RegisteredPlugin {
            plugin: lookup(DEFAULT_AUDIT)?,
            settings: configured
                .get(DEFAULT_AUDIT)
                .cloned()
                .unwrap_or_else(AuditPluginSettings::enabled),
        };

        let mut plugins = Vec::new();
        for (name, settings) in configured {
            if name == DEFAULT_AUDIT || !settings.enabled {
                continue;
            }
            plugins.push(RegisteredPlugin {
                plugin: lookup(name)?,
                settings: settings.clone(),
            });
        }

        let chain = AuditChain {
            default_audit,
            plugins,
        };
        info!("Audit chain: {}", chain.names().join(", "));
        Ok(chain)
    }
}
