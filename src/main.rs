// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use a11y_crawler::application::use_cases::run_audit_use_case::RunAuditUseCase;
use a11y_crawler::audits::registry::AuditPluginRegistry;
use a11y_crawler::config::settings::Settings;
use a11y_crawler::domain::services::progress_tracker::ProgressTracker;
use a11y_crawler::domain::services::seed_registry::SeedRegistry;
use a11y_crawler::engines::chromium_engine::ChromiumLauncher;
use a11y_crawler::infrastructure::result_writer::CsvResultWriter;
use a11y_crawler::infrastructure::seed_tables::CsvSeedRepository;
use a11y_crawler::presentation::server::spawn_status_server;
use a11y_crawler::presentation::state::StatusState;
use a11y_crawler::utils::telemetry;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并执行一次审计运行
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting a11y-crawler...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded for audit '{}'", settings.audit_name);

    let prometheus = a11y_crawler::infrastructure::metrics::init_metrics();

    // 3. Results folder and seed tables
    let use_case = RunAuditUseCase::new(
        settings.clone(),
        Arc::new(ChromiumLauncher::from_settings(&settings)),
        AuditPluginRegistry::with_builtins(),
    );
    let results_dir = use_case.prepare_results_dir(chrono::Local::now())?;
    let registry = SeedRegistry::load(&CsvSeedRepository::from_settings(&settings), &settings)?;
    let results = Arc::new(CsvResultWriter::new(&results_dir)?);
    let progress = Arc::new(ProgressTracker::new(0));

    // 4. Status server
    let (server_stop_tx, server_stop_rx) = watch::channel(false);
    if let Some(addr) = &settings.status_listen_addr {
        let state = StatusState {
            progress: progress.clone(),
            prometheus,
        };
        spawn_status_server(addr, state, server_stop_rx).await?;
    }

    // 5. Ctrl-C stops the frontier; in-flight jobs finish
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    // 6. Run
    let report = use_case
        .execute(&registry, results, progress, shutdown_rx)
        .await?;

    let audited: usize = report.workers.iter().map(|w| w.audited).sum();
    info!(
        "Audit complete: {} pages audited across {} domains in {:.1}s, results in {}",
        audited,
        report.domains.len(),
        report.snapshot.elapsed_seconds,
        results_dir.display()
    );
    if !report.short_domains.is_empty() {
        info!(
            "{} domains audited fewer pages than the configured cap",
            report.short_domains.len()
        );
    }

    let _ = server_stop_tx.send(true);
    Ok(())
}
