// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::domain::services::progress_tracker::ProgressTracker;

/// 状态服务共享状态
#[derive(Clone)]
pub struct StatusState {
    pub progress: Arc<ProgressTracker>,
    pub prometheus: Option<PrometheusHandle>,
}
