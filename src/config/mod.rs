// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理审计运行的配置设置，包括爬取范围、视口、时序和插件链
pub mod settings;
