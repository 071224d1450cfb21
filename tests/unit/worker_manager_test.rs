// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器管理器测试模块
///
/// 验证 worker 池的启动、停止信号与运行结束标记
#[cfg(test)]
mod tests {
    use crate::integration::helpers::{test_settings, MemoryResultRepository, MockLauncher, MockSite};
    use a11y_crawler::audits::registry::AuditPluginRegistry;
    use a11y_crawler::config::settings::Settings;
    use a11y_crawler::domain::models::progress::RunState;
    use a11y_crawler::domain::models::seed::{CrawlMode, SeedEntry};
    use a11y_crawler::domain::services::frontier::{Frontier, FrontierConfig};
    use a11y_crawler::domain::services::progress_tracker::ProgressTracker;
    use a11y_crawler::utils::robots::RobotsFetcher;
    use a11y_crawler::workers::dispatcher::{AuditDispatcher, DispatcherConfig};
    use a11y_crawler::workers::manager::WorkerManager;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    fn seed(url: &str) -> SeedEntry {
        SeedEntry {
            url: url.to_string(),
            organisation: "Org".to_string(),
            sector: "Sector".to_string(),
            mode: CrawlMode::Crawl,
            allows_head: true,
        }
    }

    fn manager(
        settings: Settings,
        seeds: &[SeedEntry],
        site: Arc<MockSite>,
    ) -> (WorkerManager, Arc<Frontier>, Arc<ProgressTracker>) {
        let settings = Arc::new(settings);
        let frontier = Arc::new(Frontier::new(
            FrontierConfig::from_settings(&settings),
            RobotsFetcher::new("a11y-crawler-test").unwrap(),
            seeds,
        ));
        let chain = AuditPluginRegistry::with_builtins()
            .resolve(&settings.audit_plugins)
            .unwrap();
        let dispatcher = Arc::new(AuditDispatcher::new(
            Arc::new(chain),
            DispatcherConfig::from_settings(&settings),
        ));
        let progress = Arc::new(ProgressTracker::new(frontier.pending_total() as u64));
        let manager = WorkerManager::new(
            frontier.clone(),
            dispatcher,
            MockLauncher::new(site),
            MemoryResultRepository::new(),
            progress.clone(),
            settings,
        );
        (manager, frontier, progress)
    }

    #[tokio::test]
    async fn test_workers_drain_frontier_and_finish() {
        let site = MockSite::new();
        let seeds = vec![
            seed("https://a.test/"),
            seed("https://b.test/"),
            seed("https://c.test/"),
        ];
        let (mut manager, frontier, progress) = manager(test_settings(), &seeds, site.clone());

        manager.start_workers(3).unwrap();
        let summaries = manager.wait_for_completion().await;

        let mut ids: Vec<usize> = summaries.iter().map(|s| s.worker_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(summaries.iter().map(|s| s.jobs).sum::<usize>(), 3);
        assert_eq!(frontier.pending_total(), 0);
        assert_eq!(frontier.in_flight(), 0);
        assert_eq!(progress.snapshot().state, RunState::Finished);
        // Each worker closes its own browser on exit
        assert_eq!(site.launches(), site.closes());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_dispatch() {
        let site = MockSite::new();
        let seeds = vec![seed("https://a.test/"), seed("https://b.test/")];
        let (mut manager, frontier, progress) = manager(test_settings(), &seeds, site.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = manager.stop_on(shutdown_rx);
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
        assert!(frontier.is_stopped());

        manager.start_workers(2).unwrap();
        let summaries = manager.wait_for_completion().await;

        assert!(summaries.iter().all(|s| s.jobs == 0));
        assert!(site.navigations().is_empty());
        assert_eq!(frontier.pending_total(), 2);
        assert_eq!(progress.snapshot().state, RunState::Finished);
    }
}
