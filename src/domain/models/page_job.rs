// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 命名视口
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    /// `宽x高` 形式的尺寸描述
    pub fn size_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// 页面审计任务
///
/// 由前沿队列出队时创建，被恰好一个 worker 消费，创建后不可变
#[derive(Debug, Clone)]
pub struct PageJob {
    /// 运行内唯一的任务编号
    pub id: u64,
    pub url: String,
    /// 域名键（小写、去掉 `www.`）
    pub domain: String,
    /// 产生该任务的种子URL
    pub base_url: String,
    pub organisation: String,
    pub sector: String,
    /// 需要依次审计的视口
    pub viewports: Arc<Vec<Viewport>>,
    /// 不重试，始终为 1
    pub attempt: u32,
    pub allows_head: bool,
}

/// 任务状态
///
/// 主路径为 `Queued → HeaderChecked → Loaded → Audited → Reported`，
/// 其余为提前结束的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    HeaderChecked,
    Loaded,
    Audited,
    Reported,
    SkippedByRobots,
    SkippedByPreflight,
    LoadFailed,
    /// 页面被反爬服务拦截
    Blocked,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::HeaderChecked => "header_checked",
            JobState::Loaded => "loaded",
            JobState::Audited => "audited",
            JobState::Reported => "reported",
            JobState::SkippedByRobots => "skipped_by_robots",
            JobState::SkippedByPreflight => "skipped_by_preflight",
            JobState::LoadFailed => "load_failed",
            JobState::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: JobState, to: JobState },
}

impl JobState {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Reported
                | JobState::SkippedByRobots
                | JobState::SkippedByPreflight
                | JobState::LoadFailed
                | JobState::Blocked
        )
    }

    /// 状态转换
    ///
    /// # 参数
    ///
    /// * `next` - 目标状态
    ///
    /// # 返回值
    ///
    /// * `Ok(JobState)` - 转换后的状态
    /// * `Err(DomainError)` - 转换不符合状态机
    pub fn transition(self, next: JobState) -> Result<JobState, DomainError> {
        use JobState::*;
        let allowed = matches!(
            (self, next),
            (Queued, SkippedByRobots)
                | (Queued, SkippedByPreflight)
                | (Queued, HeaderChecked)
                | (HeaderChecked, Loaded)
                | (HeaderChecked, LoadFailed)
                | (Loaded, Audited)
                | (Loaded, LoadFailed)
                | (Loaded, Blocked)
                | (Audited, Reported)
        );
        if allowed {
            Ok(next)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self,
                to: next,
            })
        }
    }

    /// 指标与日志中使用的最终结果标签；`Reported` 归入 `audited`
    pub fn outcome_label(self) -> &'static str {
        match self {
            JobState::Reported | JobState::Audited => "audited",
            JobState::SkippedByRobots => "skipped_by_robots",
            JobState::SkippedByPreflight => "skipped_by_preflight",
            JobState::LoadFailed => "load_failed",
            JobState::Blocked => "blocked",
            JobState::Queued | JobState::HeaderChecked | JobState::Loaded => "incomplete",
        }
    }
}
