use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    providers::{Provider, ProviderError},
    store::{StoreError, TabularStore, UpsertOutcome},
    types::{PhotoRecord, ProviderKind, SummaryTableRow},
    utils,
};

#[derive(Debug)]
pub enum SyncError {
    Provider {
        kind: ProviderKind,
        error: ProviderError,
    },
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Provider { kind, error } => {
                write!(f, "provider {} failed: {}", kind, error)
            }
            SyncError::Store(error) => write!(f, "store failed: {}", error),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TagCounts {
    harvested: usize,
    appended: usize,
    updated: usize,
    buffered: usize,
}

/// Per provider × tag outcome counts for one sync run.
pub struct SyncSummary {
    entries: Vec<(ProviderKind, String, TagCounts)>,
}

impl SyncSummary {
    pub fn table_rows(&self) -> Vec<SummaryTableRow> {
        self.entries
            .iter()
            .map(|(kind, tag, counts)| SummaryTableRow {
                provider: kind.to_string(),
                tag: tag.clone(),
                harvested: counts.harvested,
                appended: counts.appended,
                updated: counts.updated,
                buffered: counts.buffered,
            })
            .collect()
    }

    pub fn total_harvested(&self) -> usize {
        self.entries.iter().map(|(_, _, c)| c.harvested).sum()
    }
}

/// Runs one full harvest-and-sync pass.
///
/// For every provider and every tag, drains the provider's search and
/// upserts each record into the store, one at a time. Writes are strictly
/// sequential per store; the spreadsheet upsert is a check-then-act
/// sequence that must never interleave. A provider or store failure ends
/// the run; everything upserted before that stays committed.
pub async fn run(
    providers: &[Box<dyn Provider>],
    tags: &[String],
    store: &mut dyn TabularStore,
) -> Result<SyncSummary, SyncError> {
    store.prepare().await?;

    let mut entries: Vec<(ProviderKind, String, TagCounts)> = Vec::new();

    for provider in providers {
        let kind = provider.kind();
        for tag in tags {
            let pb = ProgressBar::new_spinner();
            pb.set_message(format!("Searching {} for #{}...", kind, tag));
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_style(
                ProgressStyle::with_template("{spinner:.blue} {msg}")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );

            let records = match provider.search(tag).await {
                Ok(records) => {
                    pb.finish_and_clear();
                    records
                }
                Err(error) => {
                    pb.finish_and_clear();
                    return Err(SyncError::Provider { kind, error });
                }
            };

            let mut counts = TagCounts {
                harvested: records.len(),
                ..TagCounts::default()
            };

            for record in &records {
                print_record(record);
                match store.upsert(record).await? {
                    UpsertOutcome::Appended => counts.appended += 1,
                    UpsertOutcome::Updated => counts.updated += 1,
                    UpsertOutcome::Buffered => counts.buffered += 1,
                }
            }

            entries.push((kind, tag.clone(), counts));
        }
    }

    store.flush().await?;

    Ok(SyncSummary { entries })
}

fn print_record(record: &PhotoRecord) {
    println!(
        "{provider}{tag}{datetime}{username}{image_url}{url}",
        provider = utils::pad(&record.provider.to_string(), 10),
        tag = utils::pad(&record.tag, 16),
        datetime = utils::pad(&record.taken_at.to_rfc3339(), 27),
        username = utils::pad(&record.username, 24),
        image_url = utils::pad(&record.image_url, 64),
        url = record.source_url
    );
}
