// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 完整运行测试
///
/// 从配置文件与 CSV 种子表出发，经由模拟浏览器执行一次审计，
/// 检查结果目录中的 CSV 文件
use super::helpers::*;
use a11y_crawler::application::use_cases::run_audit_use_case::{
    RunAuditUseCase, PAGES_SCANNED_STREAM,
};
use a11y_crawler::audits::registry::AuditPluginRegistry;
use a11y_crawler::config::settings::{Settings, DEFAULT_AUDIT};
use a11y_crawler::domain::services::progress_tracker::ProgressTracker;
use a11y_crawler::domain::services::seed_registry::SeedRegistry;
use a11y_crawler::infrastructure::result_writer::CsvResultWriter;
use a11y_crawler::infrastructure::seed_tables::CsvSeedRepository;
use a11y_crawler::utils::errors::ConfigurationError;
use chrono::{Local, TimeZone};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

fn write_config(dir: &Path, seeds: &Path, results: &Path) -> String {
    let config = format!(
        r#"
audit_name = "Quarterly audit: gov sites"
max_links_per_domain = 2
thread_count = 2
follow_robots_txt = false
perform_header_check = false
shuffle_base_urls = false
delay_after_page_load = 0.0
base_urls_crawl_path = "{crawl}"
base_urls_nocrawl_path = "{nocrawl}"
base_urls_nohead_path = ""
results_path = "{results}"

[viewport_sizes.small]
width = 320
height = 450

[audit_plugins.default_audit]
enabled = true

[audit_plugins.element_audit]
enabled = true
target_element_css_selector = "h1"
"#,
        crawl = seeds.join("crawl").display(),
        nocrawl = seeds.join("nocrawl").display(),
        results = results.display(),
    );
    let path = dir.join("audit.toml");
    fs::write(&path, config).unwrap();
    path.display().to_string()
}

#[test]
fn test_settings_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), dir.path(), &dir.path().join("results"));

    let settings = Settings::load(Some(&path)).unwrap();

    assert_eq!(settings.max_links_per_domain, 2);
    assert!(!settings.follow_robots_txt);
    // Untouched fields keep their defaults
    assert_eq!(settings.page_load_timeout, 30);
    assert_eq!(settings.viewports().len(), 1);
    assert_eq!(
        settings.audit_plugins["element_audit"].option_str("target_element_css_selector"),
        Some("h1")
    );
}

#[test]
fn test_settings_reject_unknown_viewport_reference() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
[audit_plugins.element_audit]
enabled = true
viewport_to_test = "huge"
"#,
    )
    .unwrap();

    let result = Settings::load(Some(&path.display().to_string()));

    assert!(matches!(result, Err(ConfigurationError::Validation(_))));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let result = Settings::load(Some("/nonexistent/a11y/audit.toml"));

    assert!(matches!(result, Err(ConfigurationError::Load(_))));
}

#[tokio::test]
async fn test_full_run_writes_result_tables() {
    let dir = tempfile::tempdir().unwrap();
    let seeds = dir.path().join("base_urls");
    fs::create_dir_all(seeds.join("crawl")).unwrap();
    fs::write(
        seeds.join("crawl").join("councils.csv"),
        "\u{feff}Organisation,URL,Sector\n\
         Harbour Council,https://harbour.test/,Local government\n\
         Ridge Council,https://ridge.test/,Local government\n",
    )
    .unwrap();
    let results_root = dir.path().join("results");
    let config_path = write_config(dir.path(), &seeds, &results_root);
    let settings = Arc::new(Settings::load(Some(&config_path)).unwrap());

    let site = MockSite::new();
    site.page(
        "https://harbour.test/",
        "<html><head><title>Harbour</title></head><body><h1>Welcome</h1>\
         <a href=\"/bins\">Bins</a><a href=\"/parking\">Parking</a><a href=\"/jobs\">Jobs</a></body></html>",
    );
    site.page_with_links("https://ridge.test/", "Ridge", &[]);

    let use_case = RunAuditUseCase::new(
        settings.clone(),
        MockLauncher::new(site.clone()),
        AuditPluginRegistry::with_builtins(),
    );
    let now = Local.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
    let results_dir = use_case.prepare_results_dir(now).unwrap();
    assert_eq!(
        results_dir.file_name().unwrap().to_string_lossy(),
        "2026-03-14_09-30-00_Quarterly_audit_gov_sites"
    );
    assert!(results_dir.join("config.json").exists());

    let registry =
        SeedRegistry::load(&CsvSeedRepository::from_settings(&settings), &settings).unwrap();
    assert_eq!(registry.entries().len(), 2);

    let writer = Arc::new(CsvResultWriter::new(&results_dir).unwrap());
    let progress = Arc::new(ProgressTracker::new(0));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let report = use_case
        .execute(&registry, writer.clone(), progress.clone(), shutdown_rx)
        .await
        .unwrap();

    // harbour: seed + 2 links; ridge: seed only
    assert_eq!(site.visited_urls().len(), 4);
    assert_eq!(report.short_domains, vec!["ridge.test".to_string()]);
    assert_eq!(progress.snapshot().percent, 100);

    let default_rows = read_csv(&writer.path_for(DEFAULT_AUDIT));
    assert_eq!(default_rows.len(), 5);
    assert_eq!(&default_rows[0][..3], &["audit_id", "page_id", "organisation"]);

    let element_rows = read_csv(&writer.path_for("element_audit"));
    let header = &element_rows[0];
    let count_column = header.iter().position(|c| c == "element_count").unwrap();
    let url_column = header.iter().position(|c| c == "url").unwrap();
    let harbour_home = element_rows
        .iter()
        .find(|row| row[url_column] == "https://harbour.test/")
        .unwrap();
    assert_eq!(harbour_home[count_column], "1");

    let scanned = read_csv(&writer.path_for(PAGES_SCANNED_STREAM));
    assert_eq!(scanned.len(), 3);
    assert!(scanned.iter().any(|row| row.contains(&"Harbour Council".to_string())));
}

/// 读取 CSV 文件的所有行（含表头）
fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}
