// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 配置错误类型
///
/// 启动阶段的所有致命错误都归入此类型，由 `main` 直接上报并退出
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("配置加载失败: {0}")]
    Load(#[from] config::ConfigError),

    #[error("配置校验失败: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("种子目录不可用: {path}: {reason}")]
    SeedFolder { path: String, reason: String },

    #[error("种子表格式错误: {path}: {reason}")]
    SeedTable { path: String, reason: String },

    #[error("未知的审计插件: {0}")]
    UnknownPlugin(String),

    #[error("插件 {plugin} 引用了不存在的视口: {viewport}")]
    UnknownViewport { plugin: String, viewport: String },

    #[error("结果目录不可用: {0}")]
    ResultsFolder(String),

    #[error("HTTP客户端初始化失败: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// 结果写入错误类型
#[derive(Error, Debug)]
pub enum ResultWriteError {
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}
