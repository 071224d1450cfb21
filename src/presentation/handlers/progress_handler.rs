// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::State;
use axum::Json;

use crate::domain::models::progress::ProgressSnapshot;
use crate::presentation::state::StatusState;

/// 返回最新的进度快照
pub async fn progress(State(state): State<StatusState>) -> Json<ProgressSnapshot> {
    Json(state.progress.snapshot())
}
