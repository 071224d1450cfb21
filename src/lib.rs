// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含审计运行用例
pub mod application;

/// 审计插件模块
///
/// 定义插件契约、插件注册表以及内置插件
pub mod audits;

/// 配置模块
///
/// 处理审计运行的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含种子、任务、审计结果等核心实体，以及前沿队列和进度跟踪等服务
pub mod domain;

/// 引擎模块
///
/// 浏览器会话抽象及 chromiumoxide 实现
pub mod engines;

/// 基础设施模块
///
/// CSV 种子表、结果写入与指标记录
pub mod infrastructure;

/// 表示层模块
///
/// 运行状态 HTTP 服务
pub mod presentation;

/// 工具模块
///
/// 提供 URL 处理、robots.txt、预检请求等通用功能
pub mod utils;

/// 工作器模块
///
/// 审计 worker、审计分发与 worker 管理
pub mod workers;
