// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::audit_outcome::AuditOutcome;
use crate::utils::errors::ResultWriteError;

/// 一行结果：有序的列名与单元格文本
pub type ResultRow = Vec<(String, String)>;

/// 结果流仓库
///
/// 每个流只追加，行按写入顺序保存
pub trait ResultRepository: Send + Sync {
    /// 追加一条行到指定流
    fn append_row(&self, stream: &str, row: &ResultRow) -> Result<(), ResultWriteError>;

    /// 追加一条插件结果到该插件的流
    fn append_outcome(&self, outcome: &AuditOutcome) -> Result<(), ResultWriteError> {
        self.append_row(&outcome.plugin_name, &outcome.row())
    }
}
