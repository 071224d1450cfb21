// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 未能解析组织信息时使用的占位值
pub const UNKNOWN: &str = "Unknown";

/// 种子的爬取模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// 从种子出发追加同站点链接
    Crawl,
    /// 仅审计种子本身
    Nocrawl,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlMode::Crawl => write!(f, "crawl"),
            CrawlMode::Nocrawl => write!(f, "nocrawl"),
        }
    }
}

/// 种子条目
///
/// 加载后不可变；组织与行业信息在加载时已解析完成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub url: String,
    pub organisation: String,
    pub sector: String,
    pub mode: CrawlMode,
    /// 站点是否接受 HEAD 请求
    pub allows_head: bool,
}

/// 组织与行业信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationInfo {
    pub organisation: String,
    pub sector: String,
}

impl OrganisationInfo {
    pub fn new(organisation: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            organisation: organisation.into(),
            sector: sector.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.organisation == UNKNOWN && self.sector == UNKNOWN
    }
}

/// 爬取模式种子表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSeedRow {
    pub organisation: String,
    pub url: String,
    pub sector: String,
}
