// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::repositories::result_repository::{ResultRepository, ResultRow};
use crate::utils::errors::ResultWriteError;

struct CsvStream {
    path: PathBuf,
    writer: csv::Writer<File>,
    header: Vec<String>,
}

impl CsvStream {
    fn open(path: PathBuf, header: Vec<String>) -> Result<Self, ResultWriteError> {
        let mut writer = append_writer(&path)?;
        writer.write_record(&header)?;
        writer.flush()?;
        debug!("Opened result stream {}", path.display());
        Ok(Self {
            path,
            writer,
            header,
        })
    }

    /// 追加新列并重写已有内容，旧行的新列留空
    fn widen(&mut self, columns: Vec<String>) -> Result<(), ResultWriteError> {
        self.writer.flush()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let records = reader
            .records()
            .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

        debug!(
            "Widening {} with columns {:?}",
            self.path.display(),
            columns
        );
        self.header.extend(columns);

        let staging = self.path.with_extension("csv.tmp");
        {
            let mut staged = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&staging)?;
            staged.write_record(&self.header)?;
            for record in &records {
                let mut cells: Vec<&str> = record.iter().collect();
                cells.resize(self.header.len(), "");
                staged.write_record(&cells)?;
            }
            staged.flush()?;
        }
        fs::rename(&staging, &self.path)?;
        self.writer = append_writer(&self.path)?;
        Ok(())
    }

    fn write(&mut self, row: &ResultRow) -> Result<(), ResultWriteError> {
        let missing: Vec<String> = row
            .iter()
            .map(|(key, _)| key)
            .filter(|key| !self.header.contains(key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.widen(missing)?;
        }

        let record: Vec<&str> = self
            .header
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(key, _)| key == column)
                    .map(|(_, value)| value.as_str())
                    .unwrap_or("")
            })
            .collect();
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn append_writer(path: &Path) -> Result<csv::Writer<File>, ResultWriteError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file))
}

/// CSV 结果写入器
///
/// 每个流对应结果目录下的 `{stream}.csv`，表头取自写入该文件的第一行。
/// 后续行按表头对齐，缺失的列留空；出现新列时表头向右扩展，已写入的行补空。
pub struct CsvResultWriter {
    dir: PathBuf,
    streams: DashMap<String, Arc<Mutex<Option<CsvStream>>>>,
}

impl CsvResultWriter {
    /// 创建写入器，必要时创建结果目录
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ResultWriteError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("Writing results to {}", dir.display());
        Ok(Self {
            dir,
            streams: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 某个流对应的文件路径
    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sanitise_stream_name(stream)))
    }

}

impl ResultRepository for CsvResultWriter {
    fn append_row(&self, stream: &str, row: &ResultRow) -> Result<(), ResultWriteError> {
        let slot = self
            .streams
            .entry(stream.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut guard = slot.lock();
        if guard.is_none() {
            let header = row.iter().map(|(key, _)| key.clone()).collect();
            *guard = Some(CsvStream::open(self.path_for(stream), header)?);
        }
        match guard.as_mut() {
            Some(csv_stream) => csv_stream.write(row),
            None => Ok(()),
        }
    }
}

fn sanitise_stream_name(stream: &str) -> String {
    stream
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
