// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 进度订阅测试模块
///
/// 验证观察者通过 watch 通道收到每次完成后的快照
#[cfg(test)]
mod tests {
    use a11y_crawler::domain::models::progress::RunState;
    use a11y_crawler::domain::services::progress_tracker::ProgressTracker;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_subscriber_sees_completions_and_finish() {
        let progress = Arc::new(ProgressTracker::new(3));
        let mut rx = progress.subscribe();

        let producer = {
            let progress = progress.clone();
            tokio::spawn(async move {
                for n in 0..3 {
                    progress.record_completion(format!("page {}", n));
                    tokio::task::yield_now().await;
                }
                progress.finish();
            })
        };

        let mut last = rx.borrow().clone();
        while last.state != RunState::Finished {
            rx.changed().await.unwrap();
            let next = rx.borrow_and_update().clone();
            assert!(next.iteration >= last.iteration);
            last = next;
        }
        producer.await.unwrap();

        assert_eq!(last.iteration, 3);
        assert_eq!(last.percent, 100);
        assert_eq!(last.recent_log_lines.last().map(String::as_str), Some("page 2"));
    }

    #[tokio::test]
    async fn test_growth_keeps_percent_consistent() {
        let progress = ProgressTracker::new(1);
        progress.record_completion("seed");
        assert_eq!(progress.snapshot().percent, 100);

        progress.grow(3);
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.percent, 25);
        assert_eq!(snapshot.state, RunState::Running);
    }
}
