use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::{
    store::{HEADERS, StoreError, TabularStore, USABLE_TAG_COLUMN, UpsertOutcome, merge_usable_tag},
    types::PhotoRecord,
    utils,
};

/// Append-only CSV observation log.
///
/// Every upsert appends; nothing is deduped against earlier file content.
/// The file name embeds the run date and the process start epoch so
/// repeated or concurrent runs write to distinct files. In debug mode no
/// file is created at all.
pub struct CsvStore {
    path: PathBuf,
    auto_approve: bool,
    debug: bool,
    file: Option<File>,
}

impl CsvStore {
    pub fn new(dir: &Path, auto_approve: bool, debug: bool) -> Self {
        CsvStore {
            path: dir.join(utils::csv_filename(Utc::now())),
            auto_approve,
            debug,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TabularStore for CsvStore {
    async fn prepare(&mut self) -> Result<(), StoreError> {
        if self.debug {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&self.path)
            .await?;

        let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
        file.write_all(format!("{}\n", utils::csv_line(&header)).as_bytes())
            .await?;
        file.flush().await?;

        self.file = Some(file);
        Ok(())
    }

    async fn upsert(&mut self, record: &PhotoRecord) -> Result<UpsertOutcome, StoreError> {
        if self.debug {
            return Ok(UpsertOutcome::Appended);
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StoreError::Contract("csv store used before prepare".to_string()))?;

        let mut row = record.to_row();
        row[USABLE_TAG_COLUMN] = merge_usable_tag(None, self.auto_approve, &record.tag);

        file.write_all(format!("{}\n", utils::csv_line(&row)).as_bytes())
            .await?;
        // each upsert is an independently committed append
        file.flush().await?;

        Ok(UpsertOutcome::Appended)
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }
}
