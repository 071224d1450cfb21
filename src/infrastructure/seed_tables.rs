// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::settings::Settings;
use crate::domain::models::seed::CrawlSeedRow;
use crate::domain::repositories::seed_repository::SeedRepository;
use crate::utils::errors::ConfigurationError;

/// 基于 CSV 目录的种子表数据源
///
/// 目录中每个 `.csv` 文件按文件名顺序合并
#[derive(Debug, Clone)]
pub struct CsvSeedRepository {
    crawl_dir: PathBuf,
    nocrawl_dir: PathBuf,
    nohead_dir: Option<PathBuf>,
}

impl CsvSeedRepository {
    pub fn new(
        crawl_dir: impl Into<PathBuf>,
        nocrawl_dir: impl Into<PathBuf>,
        nohead_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            crawl_dir: crawl_dir.into(),
            nocrawl_dir: nocrawl_dir.into(),
            nohead_dir,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let nohead = settings.base_urls_nohead_path.trim();
        Self::new(
            &settings.base_urls_crawl_path,
            &settings.base_urls_nocrawl_path,
            (!nohead.is_empty()).then(|| PathBuf::from(nohead)),
        )
    }
}

impl SeedRepository for CsvSeedRepository {
    fn load_crawl_rows(&self) -> Result<Vec<CrawlSeedRow>, ConfigurationError> {
        let mut rows = Vec::new();
        for path in csv_files(&self.crawl_dir)? {
            let table = read_table(&path)?;
            let organisation = column(&table, &path, "organisation")?;
            let url = column(&table, &path, "url")?;
            let sector = column(&table, &path, "sector")?;
            if table.headers.len() != 3 {
                return Err(ConfigurationError::SeedTable {
                    path: path.display().to_string(),
                    reason: format!(
                        "expected 3 columns (organisation,url,sector), found {}",
                        table.headers.len()
                    ),
                });
            }
            for record in &table.records {
                rows.push(CrawlSeedRow {
                    organisation: cell(record, organisation),
                    url: cell(record, url),
                    sector: cell(record, sector),
                });
            }
        }
        Ok(rows)
    }

    fn load_nocrawl_urls(&self) -> Result<Vec<String>, ConfigurationError> {
        load_url_tables(&self.nocrawl_dir)
    }

    fn load_nohead_urls(&self) -> Result<Vec<String>, ConfigurationError> {
        match &self.nohead_dir {
            Some(dir) if dir.exists() => load_url_tables(dir),
            Some(dir) => {
                warn!("No-head folder {} does not exist, skipping", dir.display());
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}

struct Table {
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

fn load_url_tables(dir: &Path) -> Result<Vec<String>, ConfigurationError> {
    let mut urls = Vec::new();
    for path in csv_files(dir)? {
        let table = read_table(&path)?;
        let url = column(&table, &path, "url")?;
        urls.extend(table.records.iter().map(|record| cell(record, url)));
    }
    Ok(urls)
}

/// 列出目录中的 CSV 文件；目录不可读或没有 CSV 文件时报错
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigurationError> {
    let folder_error = |reason: String| ConfigurationError::SeedFolder {
        path: dir.display().to_string(),
        reason,
    };

    let entries = fs::read_dir(dir).map_err(|e| folder_error(e.to_string()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(folder_error("no .csv tables found".to_string()));
    }
    debug!("Found {} seed tables in {}", files.len(), dir.display());
    Ok(files)
}

fn read_table(path: &Path) -> Result<Table, ConfigurationError> {
    let table_error = |reason: String| ConfigurationError::SeedTable {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| table_error(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| table_error(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_ascii_lowercase())
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| table_error(e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record);
    }
    Ok(Table { headers, records })
}

fn column(table: &Table, path: &Path, name: &str) -> Result<usize, ConfigurationError> {
    table
        .headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ConfigurationError::SeedTable {
            path: path.display().to_string(),
            reason: format!("missing '{}' column", name),
        })
}

fn cell(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or_default().to_string()
}
