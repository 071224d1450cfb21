// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::watch;
use tracing::info;

use crate::domain::models::progress::{ProgressSnapshot, RunState};

/// 计算速度时使用的最近完成次数
pub const SPEED_WINDOW: usize = 20;

/// 快照中保留的日志行数
pub const LOG_LINES: usize = 20;

struct ProgressState {
    started: Instant,
    completed: u64,
    total: u64,
    window: VecDeque<Instant>,
    logs: VecDeque<String>,
    state: RunState,
}

/// 进度跟踪器
///
/// 完成计数单调递增；每次变化都会通过 watch 通道发布新的快照
pub struct ProgressTracker {
    inner: Mutex<ProgressState>,
    tx: watch::Sender<ProgressSnapshot>,
    finished: AtomicBool,
}

impl ProgressTracker {
    /// 创建跟踪器
    ///
    /// # 参数
    ///
    /// * `initial_total` - 初始任务总数（种子数）
    pub fn new(initial_total: u64) -> Self {
        let state = ProgressState {
            started: Instant::now(),
            completed: 0,
            total: initial_total,
            window: VecDeque::with_capacity(SPEED_WINDOW),
            logs: VecDeque::with_capacity(LOG_LINES),
            state: RunState::Running,
        };
        let (tx, _rx) = watch::channel(compute(&state, Instant::now()));
        Self {
            inner: Mutex::new(state),
            tx,
            finished: AtomicBool::new(false),
        }
    }

    /// 增加任务总数（新链接入队）
    pub fn grow(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut state = self.inner.lock();
        state.total += count as u64;
        self.publish(&state);
    }

    /// 减少任务总数（待处理任务被丢弃）
    pub fn shrink(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut state = self.inner.lock();
        state.total = state.total.saturating_sub(count as u64).max(state.completed);
        self.publish(&state);
    }

    /// 记录一次任务完成
    ///
    /// # 返回值
    ///
    /// 返回更新后的快照
    pub fn record_completion(&self, line: impl Into<String>) -> ProgressSnapshot {
        let now = Instant::now();
        let mut state = self.inner.lock();
        state.completed += 1;
        if state.window.len() == SPEED_WINDOW {
            state.window.pop_front();
        }
        state.window.push_back(now);
        push_log(&mut state, line.into());
        self.publish(&state)
    }

    /// 记录一行日志而不改变计数
    pub fn log(&self, line: impl Into<String>) {
        let mut state = self.inner.lock();
        push_log(&mut state, line.into());
        self.publish(&state);
    }

    /// 标记运行结束
    ///
    /// # 返回值
    ///
    /// 只有第一次调用返回 `true`
    pub fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut state = self.inner.lock();
        state.state = RunState::Finished;
        let snapshot = self.publish(&state);
        info!(
            "Run finished: {}/{} jobs in {:.1}s",
            snapshot.iteration, snapshot.total, snapshot.elapsed_seconds
        );
        true
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// 订阅快照更新
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    fn publish(&self, state: &ProgressState) -> ProgressSnapshot {
        let snapshot = compute(state, Instant::now());
        self.tx.send_replace(snapshot.clone());
        snapshot
    }
}

fn push_log(state: &mut ProgressState, line: String) {
    if state.logs.len() == LOG_LINES {
        state.logs.pop_front();
    }
    state.logs.push_back(line);
}

fn compute(state: &ProgressState, now: Instant) -> ProgressSnapshot {
    let elapsed = now.duration_since(state.started).as_secs_f64();

    let windowed = match (state.window.front(), state.window.back()) {
        (Some(first), Some(last)) if state.window.len() >= 2 => {
            let span = last.duration_since(*first).as_secs_f64();
            (span > 0.0).then(|| (state.window.len() - 1) as f64 / span)
        }
        _ => None,
    };
    let speed = windowed.unwrap_or_else(|| {
        if elapsed > 0.0 {
            state.completed as f64 / elapsed
        } else {
            0.0
        }
    });

    let remaining_jobs = state.total.saturating_sub(state.completed) as f64;
    let remaining = if speed > 0.0 {
        remaining_jobs / speed
    } else {
        0.0
    };

    ProgressSnapshot {
        iteration: state.completed,
        total: state.total,
        percent: percent(state.completed, state.total),
        elapsed_seconds: elapsed,
        remaining_estimate_seconds: remaining,
        speed_per_second: speed,
        state: state.state,
        recent_log_lines: state.logs.iter().cloned().collect(),
    }
}

/// `round(100 * completed / total)`，总数为 0 时为 0
pub fn percent(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u64
}
