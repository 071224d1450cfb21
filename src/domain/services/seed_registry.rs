// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{error, info, warn};

use crate::config::settings::Settings;
use crate::domain::models::seed::{CrawlMode, CrawlSeedRow, OrganisationInfo, SeedEntry};
use crate::domain::repositories::seed_repository::SeedRepository;
use crate::utils::errors::ConfigurationError;
use crate::utils::url_utils::{domain_key, domain_of, normalize};

/// 种子与域名注册表
///
/// 持有过滤、排序后的种子列表，以及域名到组织信息的查找表
#[derive(Debug, Clone, Default)]
pub struct SeedRegistry {
    entries: Vec<SeedEntry>,
    lookup: HashMap<String, OrganisationInfo>,
    no_head: HashSet<String>,
}

impl SeedRegistry {
    /// 从种子数据源加载注册表
    ///
    /// # 参数
    ///
    /// * `repository` - 种子表数据源
    /// * `settings` - 运行配置
    ///
    /// # 返回值
    ///
    /// * `Ok(SeedRegistry)` - 加载完成的注册表
    /// * `Err(ConfigurationError)` - 种子表缺失或格式错误
    pub fn load(
        repository: &dyn SeedRepository,
        settings: &Settings,
    ) -> Result<Self, ConfigurationError> {
        let crawl_rows = match repository.load_crawl_rows() {
            Ok(rows) => rows,
            // Crawl tables only feed the organisation lookup in nocrawl mode
            Err(e) if settings.nocrawl_mode => {
                warn!("Organisation lookup unavailable: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let nocrawl_urls = if settings.nocrawl_mode {
            repository.load_nocrawl_urls()?
        } else {
            Vec::new()
        };
        let nohead_urls = repository.load_nohead_urls()?;

        let registry = Self::from_rows(
            crawl_rows,
            nocrawl_urls,
            nohead_urls,
            settings,
            &mut rand::rng(),
        );
        info!(
            "Loaded {} seed entries ({} domains in lookup)",
            registry.entries.len(),
            registry.lookup.len()
        );
        Ok(registry)
    }

    /// 由已读取的表格行构建注册表
    pub fn from_rows<R: Rng + ?Sized>(
        crawl_rows: Vec<CrawlSeedRow>,
        nocrawl_urls: Vec<String>,
        nohead_urls: Vec<String>,
        settings: &Settings,
        rng: &mut R,
    ) -> Self {
        let no_head: HashSet<String> = nohead_urls.iter().filter_map(|u| domain_of(u)).collect();

        let mut lookup = HashMap::new();
        for row in &crawl_rows {
            if let Some(key) = domain_of(&row.url) {
                lookup
                    .entry(key)
                    .or_insert_with(|| OrganisationInfo::new(&row.organisation, &row.sector));
            }
        }

        let mut registry = Self {
            entries: Vec::new(),
            lookup,
            no_head,
        };

        let candidates: Vec<(String, Option<OrganisationInfo>, CrawlMode)> =
            if settings.nocrawl_mode {
                nocrawl_urls
                    .into_iter()
                    .map(|url| (url, None, CrawlMode::Nocrawl))
                    .collect()
            } else {
                crawl_rows
                    .into_iter()
                    .map(|row| {
                        let info = OrganisationInfo::new(row.organisation, row.sector);
                        (row.url, Some(info), CrawlMode::Crawl)
                    })
                    .collect()
            };

        let mut entries = Vec::new();
        for (raw_url, info, mode) in candidates {
            let Some(url) = sanitise_seed(&raw_url, settings.only_allow_https) else {
                continue;
            };
            let info = match info {
                Some(info) => info,
                None => registry.lookup_organisation(&url),
            };
            let entry = SeedEntry {
                allows_head: registry.allows_head(&url),
                url,
                organisation: info.organisation,
                sector: info.sector,
                mode,
            };
            if passes_filters(
                &entry,
                &settings.filter_to_organisations,
                &settings.filter_to_domains,
            ) {
                entries.push(entry);
            }
        }

        if settings.shuffle_base_urls {
            entries.shuffle(rng);
            entries = spread_by_host(entries);
        }

        registry.entries = entries;
        registry
    }

    /// 已加载的种子条目
    pub fn entries(&self) -> &[SeedEntry] {
        &self.entries
    }

    /// 按域名查找组织信息
    ///
    /// 查找键为小写主机名且忽略 `www.`；未命中时返回 `Unknown` 并记录警告
    pub fn lookup_organisation(&self, url: &str) -> OrganisationInfo {
        match domain_of(url).and_then(|key| self.lookup.get(&key)) {
            Some(info) => info.clone(),
            None => {
                warn!("No organisation found for {}, using Unknown", url);
                OrganisationInfo::unknown()
            }
        }
    }

    /// 站点是否接受 HEAD 请求
    pub fn allows_head(&self, url: &str) -> bool {
        domain_of(url)
            .map(|key| !self.no_head.contains(&key))
            .unwrap_or(true)
    }
}

fn sanitise_seed(raw: &str, only_allow_https: bool) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let url = match normalize(trimmed) {
        Ok(url) => url,
        Err(e) => {
            error!("Skipping seed '{}': {}", trimmed, e);
            return None;
        }
    };
    if only_allow_https && url.scheme() != "https" {
        error!("Skipping non-https seed '{}'", trimmed);
        return None;
    }
    Some(url.to_string())
}

fn passes_filters(entry: &SeedEntry, organisations: &[String], domains: &[String]) -> bool {
    let organisation_ok = organisations.is_empty()
        || organisations
            .iter()
            .any(|needle| entry.organisation.contains(needle.as_str()));
    let domain_ok =
        domains.is_empty() || domains.iter().any(|needle| entry.url.contains(needle.as_str()));
    organisation_ok && domain_ok
}

/// 重排条目，尽量让同一主机的条目不相邻
///
/// 每一步从剩余条目最多、且不同于上一个的主机中取一条
fn spread_by_host(entries: Vec<SeedEntry>) -> Vec<SeedEntry> {
    let total = entries.len();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, VecDeque<SeedEntry>> = HashMap::new();
    for entry in entries {
        let key = url::Url::parse(&entry.url)
            .ok()
            .as_ref()
            .and_then(domain_key)
            .unwrap_or_default();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push_back(entry);
    }

    let mut result = Vec::with_capacity(total);
    let mut last: Option<usize> = None;
    while result.len() < total {
        let remaining = |i: usize| groups.get(&order[i]).map(VecDeque::len).unwrap_or(0);
        let pick = (0..order.len())
            .filter(|&i| Some(i) != last && remaining(i) > 0)
            .max_by_key(|&i| (remaining(i), Reverse(i)))
            .or(last.filter(|&i| remaining(i) > 0));
        let Some(index) = pick else {
            break;
        };
        if let Some(entry) = groups.get_mut(&order[index]).and_then(VecDeque::pop_front) {
            result.push(entry);
        }
        last = Some(index);
    }
    result
}
