mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::fs;

use common::{CountingTokens, FakeSheetTransport};
use tagsync::providers::{Provider, ProviderError};
use tagsync::store::{CsvStore, SheetStore, URL_COLUMN, USABLE_TAG_COLUMN};
use tagsync::sync::{self, SyncError};
use tagsync::types::{PhotoRecord, ProviderKind};

fn record(url: &str, license: &str) -> PhotoRecord {
    PhotoRecord {
        provider: ProviderKind::Flickr,
        tag: "tagB".to_string(),
        taken_at: Utc.with_ymd_and_hms(2014, 8, 16, 14, 3, 55).unwrap(),
        username: "kueda".to_string(),
        usable_tag: String::new(),
        image_url: "https://farm.example.com/o.jpg".to_string(),
        image_url_medium: "https://farm.example.com/c.jpg".to_string(),
        image_url_small: "https://farm.example.com/m.jpg".to_string(),
        source_url: url.to_string(),
        license: license.to_string(),
        title: "smoke column".to_string(),
    }
}

/// Provider stub that replays a fixed harvest for every searched tag.
struct FakeProvider {
    records: Vec<PhotoRecord>,
}

#[async_trait]
impl Provider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Flickr
    }

    async fn search(&self, tag: &str) -> Result<Vec<PhotoRecord>, ProviderError> {
        Ok(self
            .records
            .iter()
            .cloned()
            .map(|mut r| {
                r.tag = tag.to_string();
                r
            })
            .collect())
    }
}

struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Instagram
    }

    async fn search(&self, _tag: &str) -> Result<Vec<PhotoRecord>, ProviderError> {
        Err(ProviderError::Credentials("bad client id".to_string()))
    }
}

fn sheet_store(rows: Arc<Mutex<Vec<Vec<String>>>>, auto_approve: bool) -> SheetStore {
    SheetStore::new(
        Box::new(FakeSheetTransport::with_rows(rows)),
        Box::new(CountingTokens::new()),
        auto_approve,
        false,
        1,
    )
}

async fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "tagsync-sync-test-{pid}-{name}",
        pid = std::process::id(),
        name = name
    ));
    let _ = fs::remove_dir_all(&dir).await;
    fs::create_dir_all(&dir).await.unwrap();
    dir
}

#[tokio::test]
async fn test_rerunning_the_driver_is_idempotent() {
    let providers: Vec<Box<dyn Provider>> = vec![Box::new(FakeProvider {
        records: vec![record("http://x/1", "CC BY"), record("http://x/2", "PD")],
    })];
    let tags = vec!["tagB".to_string()];

    let rows: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));

    let mut store = sheet_store(rows.clone(), true);
    let first = sync::run(&providers, &tags, &mut store).await.unwrap();
    assert_eq!(first.total_harvested(), 2);

    let mut store = sheet_store(rows.clone(), true);
    let second = sync::run(&providers, &tags, &mut store).await.unwrap();
    assert_eq!(second.total_harvested(), 2);

    // one header plus exactly one row per distinct permalink
    let snapshot = rows.lock().unwrap().clone();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[1][URL_COLUMN], "http://x/1");
    assert_eq!(snapshot[2][URL_COLUMN], "http://x/2");

    // the first run auto-approved; the second run kept that decision
    assert_eq!(snapshot[1][USABLE_TAG_COLUMN], "tagB");
    assert_eq!(snapshot[2][USABLE_TAG_COLUMN], "tagB");
}

#[tokio::test]
async fn test_curated_rows_survive_a_later_harvest() {
    let providers: Vec<Box<dyn Provider>> = vec![Box::new(FakeProvider {
        records: vec![record("http://x/1", "CC BY")],
    })];

    let rows: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));

    // first pass without auto-approve leaves usable_tag empty
    let mut store = sheet_store(rows.clone(), false);
    sync::run(&providers, &["tagA".to_string()], &mut store)
        .await
        .unwrap();

    // a human approves the row out of band
    rows.lock().unwrap()[1][USABLE_TAG_COLUMN] = "tagA".to_string();

    // a later harvest under another tag must not clobber the decision
    let mut store = sheet_store(rows.clone(), true);
    sync::run(&providers, &["tagB".to_string()], &mut store)
        .await
        .unwrap();

    let snapshot = rows.lock().unwrap().clone();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1][USABLE_TAG_COLUMN], "tagA");
    assert_eq!(snapshot[1][1], "tagB");
}

#[tokio::test]
async fn test_decoded_license_lands_in_the_csv_column() {
    let providers: Vec<Box<dyn Provider>> = vec![Box::new(FakeProvider {
        records: vec![record("http://x/1", "CC BY")],
    })];
    let tags = vec!["tagB".to_string()];

    let dir = scratch_dir("license").await;
    let mut store = CsvStore::new(&dir, false, false);
    let path = store.path().to_path_buf();

    sync::run(&providers, &tags, &mut store).await.unwrap();

    let content = fs::read_to_string(&path).await.unwrap();
    let row = content.lines().nth(1).unwrap();
    assert_eq!(row.split(',').nth(9).unwrap(), "CC BY");
    assert_eq!(row.split(',').nth(6).unwrap(), "http://x/1");

    let _ = fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_provider_failure_aborts_the_run_by_name() {
    let providers: Vec<Box<dyn Provider>> = vec![Box::new(FailingProvider)];
    let tags = vec!["tagB".to_string()];

    let rows: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let mut store = sheet_store(rows.clone(), false);

    match sync::run(&providers, &tags, &mut store).await {
        Err(SyncError::Provider { kind, .. }) => assert_eq!(kind, ProviderKind::Instagram),
        other => panic!("expected a provider failure, got {:?}", other.is_err()),
    }

    // the prepared header stays; partial progress is never rolled back
    assert_eq!(rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_summary_counts_outcomes_per_provider_and_tag() {
    let providers: Vec<Box<dyn Provider>> = vec![Box::new(FakeProvider {
        records: vec![record("http://x/1", "CC BY"), record("http://x/1", "CC BY")],
    })];
    let tags = vec!["tagB".to_string()];

    let rows: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let mut store = sheet_store(rows.clone(), false);

    let summary = sync::run(&providers, &tags, &mut store).await.unwrap();
    let table = summary.table_rows();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].provider, "Flickr");
    assert_eq!(table[0].tag, "tagB");
    assert_eq!(table[0].harvested, 2);
    assert_eq!(table[0].appended, 1);
    assert_eq!(table[0].updated, 1);
    assert_eq!(table[0].buffered, 0);
}
