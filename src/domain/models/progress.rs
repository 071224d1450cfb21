// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Running,
    Finished,
}

/// 进度快照
///
/// 每次任务完成时重新计算，观察者只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressSnapshot {
    /// 已完成任务数
    pub iteration: u64,
    /// 当前已知任务总数
    pub total: u64,
    pub percent: u64,
    #[serde(rename = "elapsed")]
    pub elapsed_seconds: f64,
    #[serde(rename = "remaining")]
    pub remaining_estimate_seconds: f64,
    #[serde(rename = "speed")]
    pub speed_per_second: f64,
    pub state: RunState,
    #[serde(rename = "logs")]
    pub recent_log_lines: Vec<String>,
}
