// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OnceCell};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::settings::Settings;
use crate::domain::models::page_job::{JobState, PageJob, Viewport};
use crate::domain::models::seed::SeedEntry;
use crate::utils::robots::{RobotsFetcher, RobotsRules};
use crate::utils::url_utils::{
    domain_key, has_disallowed_extension, normalize, origin_of, scope_prefix,
};

/// 连续加载失败达到该次数后放弃整个域名
pub const MAX_CONSECUTIVE_LOAD_FAILURES: u32 = 3;

/// 前沿队列配置
#[derive(Debug, Clone)]
pub struct FrontierConfig {
    pub max_links_per_domain: usize,
    pub only_allow_https: bool,
    pub follow_robots_txt: bool,
    pub crawl_enabled: bool,
    pub user_agent_token: String,
    pub viewports: Arc<Vec<Viewport>>,
}

impl FrontierConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_links_per_domain: settings.max_links_per_domain,
            only_allow_https: settings.only_allow_https,
            follow_robots_txt: settings.follow_robots_txt,
            crawl_enabled: settings.crawl_enabled(),
            user_agent_token: settings.user_agent_product_token.clone(),
            viewports: Arc::new(settings.viewports()),
        }
    }
}

/// 待处理URL及其继承自种子的元数据
#[derive(Debug, Clone)]
struct QueuedUrl {
    url: String,
    base_url: String,
    organisation: String,
    sector: String,
}

/// 单个域名的可变状态
#[derive(Debug, Default)]
struct DomainState {
    /// 已追加的发现链接数（不含种子）
    visited_count: usize,
    /// 已入队或已处理的URL
    visited: HashSet<String>,
    pending: VecDeque<QueuedUrl>,
    consecutive_failures: u32,
    audited: usize,
    abandoned: bool,
}

struct DomainEntry {
    domain: String,
    origin: String,
    base_url: String,
    organisation: String,
    sector: String,
    allows_head: bool,
    /// 该域名上所有种子的爬取范围前缀
    scopes: Vec<String>,
    robots: OnceCell<RobotsRules>,
    state: Mutex<DomainState>,
}

/// 单个域名的统计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStats {
    pub domain: String,
    pub base_url: String,
    pub organisation: String,
    pub sector: String,
    pub links_admitted: usize,
    pub pages_audited: usize,
    pub pending: usize,
    pub abandoned: bool,
}

/// 一次上报的处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// 新入队的链接数
    pub admitted: usize,
    /// 因放弃域名而丢弃的待处理任务数
    pub dropped: usize,
}

/// 爬取前沿
///
/// 每个域名一个队列，`next()` 在非空队列之间轮询。每个域名的状态由独立的锁保护，
/// 锁从不跨越 `.await` 持有；robots 规则在锁外按需抓取一次。
pub struct Frontier {
    config: FrontierConfig,
    robots: RobotsFetcher,
    domains: Vec<Arc<DomainEntry>>,
    index: DashMap<String, Arc<DomainEntry>>,
    cursor: AtomicUsize,
    in_flight: AtomicUsize,
    /// 已分发但尚未上报的任务ID
    in_flight_jobs: DashSet<u64>,
    next_job_id: AtomicU64,
    stopped: AtomicBool,
    notify: Notify,
}

impl Frontier {
    /// 以种子条目初始化前沿
    ///
    /// 种子直接入队，不占用链接预算；同一域名的重复种子只保留一次
    ///
    /// # 参数
    ///
    /// * `config` - 前沿配置
    /// * `robots` - robots.txt 抓取器
    /// * `seeds` - 已过滤、排序后的种子
    pub fn new(config: FrontierConfig, robots: RobotsFetcher, seeds: &[SeedEntry]) -> Self {
        let mut domains: Vec<Arc<DomainEntry>> = Vec::new();
        let index: DashMap<String, Arc<DomainEntry>> = DashMap::new();

        let mut scopes: HashMap<String, Vec<String>> = HashMap::new();
        for url in seeds.iter().filter_map(|seed| normalize(&seed.url).ok()) {
            if let (Some(domain), Some(scope)) = (domain_key(&url), scope_prefix(&url)) {
                let registered = scopes.entry(domain).or_default();
                if !registered.contains(&scope) {
                    registered.push(scope);
                }
            }
        }

        for seed in seeds {
            let Ok(url) = normalize(&seed.url) else {
                continue;
            };
            let Some(domain) = domain_key(&url) else {
                continue;
            };

            let entry = index
                .entry(domain.clone())
                .or_insert_with(|| {
                    let entry = Arc::new(DomainEntry {
                        domain: domain.clone(),
                        origin: origin_of(&url),
                        base_url: url.to_string(),
                        organisation: seed.organisation.clone(),
                        sector: seed.sector.clone(),
                        allows_head: seed.allows_head,
                        scopes: scopes.get(&domain).cloned().unwrap_or_default(),
                        robots: OnceCell::new(),
                        state: Mutex::new(DomainState::default()),
                    });
                    domains.push(entry.clone());
                    entry
                })
                .clone();

            let mut state = entry.state.lock();
            if state.visited.insert(url.to_string()) {
                state.pending.push_back(QueuedUrl {
                    url: url.to_string(),
                    base_url: url.to_string(),
                    organisation: seed.organisation.clone(),
                    sector: seed.sector.clone(),
                });
            }
        }

        info!("Frontier seeded with {} domains", domains.len());

        Self {
            config,
            robots,
            domains,
            index,
            cursor: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            in_flight_jobs: DashSet::new(),
            next_job_id: AtomicU64::new(1),
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// 取出下一个任务
    ///
    /// 所有队列为空时，只要还有进行中的任务就等待其上报；
    /// 队列全空且无进行中任务，或已停止时返回 `None`
    pub async fn next(&self) -> Option<PageJob> {
        loop {
            let notified = self.notify.notified();

            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(job) = self.try_dequeue() {
                return Some(job);
            }
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                // A reporter pushes links before decrementing in_flight
                return self.try_dequeue();
            }

            notified.await;
        }
    }

    fn try_dequeue(&self) -> Option<PageJob> {
        let count = self.domains.len();
        if count == 0 {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % count;
        for offset in 0..count {
            let entry = &self.domains[(start + offset) % count];
            let mut state = entry.state.lock();
            if let Some(queued) = state.pending.pop_front() {
                let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
                self.in_flight_jobs.insert(id);
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                drop(state);
                return Some(PageJob {
                    id,
                    url: queued.url,
                    domain: entry.domain.clone(),
                    base_url: queued.base_url,
                    organisation: queued.organisation,
                    sector: queued.sector,
                    viewports: self.config.viewports.clone(),
                    attempt: 1,
                    allows_head: entry.allows_head,
                });
            }
        }
        None
    }

    /// 判断任务URL是否被 robots 规则允许
    pub async fn robots_allows(&self, job: &PageJob) -> bool {
        if !self.config.follow_robots_txt {
            return true;
        }
        let Some(entry) = self.entry(&job.domain) else {
            return true;
        };
        self.rules_for(&entry)
            .await
            .allows(&job.url, &self.config.user_agent_token)
    }

    async fn rules_for<'a>(&self, entry: &'a DomainEntry) -> &'a RobotsRules {
        entry
            .robots
            .get_or_init(|| async {
                debug!("Fetching robots.txt for {}", entry.origin);
                self.robots.fetch(&entry.origin).await
            })
            .await
    }

    /// 上报任务结果
    ///
    /// 只有 `Audited`/`Reported` 任务的链接会参与准入；连续加载失败达到上限时放弃域名。
    /// 同一任务只有第一次上报会释放其占用
    ///
    /// # 参数
    ///
    /// * `job` - 已完成的任务
    /// * `state` - 任务终态
    /// * `links` - 从渲染后页面中发现的链接
    pub async fn report(&self, job: &PageJob, state: JobState, links: Vec<Url>) -> ReportSummary {
        let mut summary = ReportSummary::default();

        let succeeded = matches!(state, JobState::Audited | JobState::Reported);
        if succeeded && self.config.crawl_enabled && !links.is_empty() {
            if let Some(entry) = self.entry(&job.domain) {
                summary.admitted = self.admit_links(&entry, job, links).await;
            }
        }

        summary.dropped = self.release(job.id, &job.domain, state).unwrap_or(0);
        summary
    }

    /// 为已分发的任务创建占用凭证
    ///
    /// 凭证在任务未上报时被丢弃（worker 提前退出或 panic 展开），会按加载失败释放该任务
    pub fn claim(self: &Arc<Self>, job: &PageJob) -> InFlightGuard {
        InFlightGuard {
            frontier: self.clone(),
            job_id: job.id,
            domain: job.domain.clone(),
        }
    }

    /// 结算任务终态并释放占用；任务已释放时返回 `None`
    fn release(&self, job_id: u64, domain: &str, state: JobState) -> Option<usize> {
        self.in_flight_jobs.remove(&job_id)?;

        let dropped = self
            .entry(domain)
            .map(|entry| Self::settle(&entry, state))
            .unwrap_or(0);

        // Links are queued before the slot is freed
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        Some(dropped)
    }

    /// 更新域名的失败计数；返回因放弃域名而丢弃的任务数
    fn settle(entry: &DomainEntry, state: JobState) -> usize {
        let mut domain_state = entry.state.lock();
        match state {
            JobState::Audited | JobState::Reported => {
                domain_state.consecutive_failures = 0;
                domain_state.audited += 1;
                0
            }
            JobState::LoadFailed => {
                domain_state.consecutive_failures += 1;
                if domain_state.consecutive_failures >= MAX_CONSECUTIVE_LOAD_FAILURES
                    && !domain_state.abandoned
                {
                    domain_state.abandoned = true;
                    let dropped = domain_state.pending.len();
                    domain_state.pending.clear();
                    error!(
                        "Abandoning {} after {} consecutive load failures ({} pending dropped)",
                        entry.domain, domain_state.consecutive_failures, dropped
                    );
                    dropped
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    async fn admit_links(&self, entry: &DomainEntry, job: &PageJob, links: Vec<Url>) -> usize {
        let candidates: Vec<Url> = links
            .into_iter()
            .filter_map(|link| self.syntactic_candidate(entry, &job.base_url, link))
            .collect();
        if candidates.is_empty() {
            return 0;
        }

        let candidates: Vec<Url> = if self.config.follow_robots_txt {
            let rules = self.rules_for(entry).await;
            candidates
                .into_iter()
                .filter(|url| {
                    let allowed = rules.allows(url.as_str(), &self.config.user_agent_token);
                    if !allowed {
                        debug!("robots.txt disallows {}", url);
                    }
                    allowed
                })
                .collect()
        } else {
            candidates
        };

        let mut state = entry.state.lock();
        if state.abandoned {
            return 0;
        }
        let mut admitted = 0;
        for url in candidates {
            if state.visited_count >= self.config.max_links_per_domain {
                break;
            }
            let key = url.to_string();
            if state.visited.insert(key.clone()) {
                state.pending.push_back(QueuedUrl {
                    url: key,
                    base_url: job.base_url.clone(),
                    organisation: job.organisation.clone(),
                    sector: job.sector.clone(),
                });
                state.visited_count += 1;
                admitted += 1;
            }
        }

        if admitted > 0 {
            metrics::counter!("frontier_links_admitted_total").increment(admitted as u64);
            debug!("Admitted {} links for {}", admitted, entry.domain);
        }
        admitted
    }

    /// 与 robots 无关的准入检查；返回规范化后的URL
    ///
    /// 链接必须位于任务种子的范围内，且不属于同一域名上更具体的其他种子
    fn syntactic_candidate(&self, entry: &DomainEntry, base_url: &str, link: Url) -> Option<Url> {
        let url = normalize(link.as_str()).ok()?;
        if domain_key(&url).as_deref() != Some(entry.domain.as_str()) {
            return None;
        }
        if !Self::in_scope(entry, base_url, &url) {
            debug!("{} is outside the scope of {}", url, base_url);
            return None;
        }
        if self.config.only_allow_https && url.scheme() != "https" {
            return None;
        }
        if has_disallowed_extension(&url) {
            return None;
        }
        Some(url)
    }

    fn in_scope(entry: &DomainEntry, base_url: &str, url: &Url) -> bool {
        let Some(base_scope) = normalize(base_url).ok().as_ref().and_then(scope_prefix) else {
            return true;
        };
        let Some(scope) = scope_prefix(url) else {
            return false;
        };
        if !scope.starts_with(&base_scope) {
            return false;
        }
        !entry
            .scopes
            .iter()
            .any(|other| other.len() > base_scope.len() && scope.starts_with(other.as_str()))
    }

    /// 停止分发任务；进行中的任务仍可上报
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("Frontier stopped, no further jobs will be handed out");
        }
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 当前排队的任务总数
    pub fn pending_total(&self) -> usize {
        self.domains.iter().map(|e| e.state.lock().pending.len()).sum()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// 某域名已追加的发现链接数
    pub fn visited_count(&self, domain: &str) -> Option<usize> {
        self.entry(domain).map(|e| e.state.lock().visited_count)
    }

    /// 按种子顺序返回所有域名的统计信息
    pub fn domain_stats(&self) -> Vec<DomainStats> {
        self.domains
            .iter()
            .map(|entry| {
                let state = entry.state.lock();
                DomainStats {
                    domain: entry.domain.clone(),
                    base_url: entry.base_url.clone(),
                    organisation: entry.organisation.clone(),
                    sector: entry.sector.clone(),
                    links_admitted: state.visited_count,
                    pages_audited: state.audited,
                    pending: state.pending.len(),
                    abandoned: state.abandoned,
                }
            })
            .collect()
    }

    fn entry(&self, domain: &str) -> Option<Arc<DomainEntry>> {
        self.index.get(domain).map(|e| e.value().clone())
    }
}

/// 进行中任务的占用凭证，见 [`Frontier::claim`]
pub struct InFlightGuard {
    frontier: Arc<Frontier>,
    job_id: u64,
    domain: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self
            .frontier
            .release(self.job_id, &self.domain, JobState::LoadFailed)
            .is_some()
        {
            warn!(
                "Job {} on {} ended without a report, released as load failure",
                self.job_id, self.domain
            );
        }
    }
}
