// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::seed::CrawlSeedRow;
use crate::utils::errors::ConfigurationError;

/// 种子表数据源
///
/// 只在启动阶段调用一次，任何错误都视为致命的配置错误
pub trait SeedRepository: Send + Sync {
    /// 读取爬取模式种子表（`organisation,url,sector`）
    fn load_crawl_rows(&self) -> Result<Vec<CrawlSeedRow>, ConfigurationError>;

    /// 读取非爬取模式种子表（`url`）
    fn load_nocrawl_urls(&self) -> Result<Vec<String>, ConfigurationError>;

    /// 读取不支持 HEAD 请求的站点列表（`url`）
    fn load_nohead_urls(&self) -> Result<Vec<String>, ConfigurationError>;
}
