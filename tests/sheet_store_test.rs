mod common;

use std::sync::atomic::Ordering;

use chrono::{TimeZone, Utc};

use common::{CountingTokens, FakeSheetTransport};
use tagsync::store::{
    HEADERS, SheetStore, StoreError, TabularStore, TransportError, URL_COLUMN, USABLE_TAG_COLUMN,
    UpsertOutcome,
};
use tagsync::types::{PhotoRecord, ProviderKind};

fn record(url: &str, tag: &str) -> PhotoRecord {
    PhotoRecord {
        provider: ProviderKind::Flickr,
        tag: tag.to_string(),
        taken_at: Utc.with_ymd_and_hms(2014, 8, 16, 14, 3, 55).unwrap(),
        username: "kueda".to_string(),
        usable_tag: String::new(),
        image_url: "https://farm.example.com/o.jpg".to_string(),
        image_url_medium: "https://farm.example.com/c.jpg".to_string(),
        image_url_small: "https://farm.example.com/m.jpg".to_string(),
        source_url: url.to_string(),
        license: "CC BY".to_string(),
        title: "smoke column".to_string(),
    }
}

fn header_row() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

fn data_row(url: &str, usable_tag: &str) -> Vec<String> {
    let mut cells = record(url, "seed").to_row();
    cells[USABLE_TAG_COLUMN] = usable_tag.to_string();
    cells
}

fn store_over(
    transport: FakeSheetTransport,
    auto_approve: bool,
    debug: bool,
    batch_rows: usize,
) -> SheetStore {
    SheetStore::new(
        Box::new(transport),
        Box::new(CountingTokens::new()),
        auto_approve,
        debug,
        batch_rows,
    )
}

#[tokio::test]
async fn test_prepare_writes_header_only_when_sheet_is_empty() {
    let transport = FakeSheetTransport::new(Vec::new());
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 1);

    store.prepare().await.unwrap();
    assert_eq!(rows.lock().unwrap().clone(), vec![header_row()]);

    // a second prepare sees the header and leaves the sheet alone
    store.prepare().await.unwrap();
    assert_eq!(rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upsert_appends_new_record() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 1);

    let outcome = store.upsert(&record("http://x/1", "tagB")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Appended);

    let snapshot = rows.lock().unwrap().clone();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1][URL_COLUMN], "http://x/1");
    assert_eq!(snapshot[1][USABLE_TAG_COLUMN], "");
    assert_eq!(snapshot[1][9], "CC BY");
}

#[tokio::test]
async fn test_upsert_twice_leaves_one_row_per_url() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 1);

    assert_eq!(
        store.upsert(&record("http://x/1", "tagB")).await.unwrap(),
        UpsertOutcome::Appended
    );
    assert_eq!(
        store.upsert(&record("http://x/1", "tagB")).await.unwrap(),
        UpsertOutcome::Updated
    );

    assert_eq!(rows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_resident_usable_tag_survives_resync() {
    // existing row sits at sheet row 6, curated as "tagA"
    let mut seed = vec![header_row()];
    for i in 1..=4 {
        seed.push(data_row(&format!("http://x/filler{}", i), ""));
    }
    seed.push(data_row("http://x/1", "tagA"));

    let transport = FakeSheetTransport::new(seed);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, true, false, 1);

    let outcome = store.upsert(&record("http://x/1", "tagB")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let snapshot = rows.lock().unwrap().clone();
    // updated in place, no extra row
    assert_eq!(snapshot.len(), 6);
    assert_eq!(snapshot[5][URL_COLUMN], "http://x/1");
    assert_eq!(snapshot[5][USABLE_TAG_COLUMN], "tagA");
    // the rest of the row reflects the fresh harvest
    assert_eq!(snapshot[5][1], "tagB");
}

#[tokio::test]
async fn test_auto_approve_fills_only_empty_usable_tag() {
    let seed = vec![header_row(), data_row("http://x/1", "")];
    let transport = FakeSheetTransport::new(seed);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, true, false, 1);

    store.upsert(&record("http://x/1", "tagB")).await.unwrap();
    assert_eq!(rows.lock().unwrap()[1][USABLE_TAG_COLUMN], "tagB");

    // new rows are pre-approved as well
    store.upsert(&record("http://x/2", "tagB")).await.unwrap();
    assert_eq!(rows.lock().unwrap()[2][USABLE_TAG_COLUMN], "tagB");
}

#[tokio::test]
async fn test_without_auto_approve_usable_tag_stays_empty() {
    let seed = vec![header_row(), data_row("http://x/1", "")];
    let transport = FakeSheetTransport::new(seed);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 1);

    store.upsert(&record("http://x/1", "tagB")).await.unwrap();
    assert_eq!(rows.lock().unwrap()[1][USABLE_TAG_COLUMN], "");
}

#[tokio::test]
async fn test_debug_mode_reads_but_never_writes() {
    let seed = vec![header_row(), data_row("http://x/1", "tagA")];
    let transport = FakeSheetTransport::new(seed.clone());
    let rows = transport.rows.clone();
    let reads = transport.reads.clone();
    let writes = transport.writes.clone();
    let mut store = store_over(transport, true, true, 1);

    store.prepare().await.unwrap();
    assert_eq!(
        store.upsert(&record("http://x/1", "tagB")).await.unwrap(),
        UpsertOutcome::Updated
    );
    assert_eq!(
        store.upsert(&record("http://x/2", "tagB")).await.unwrap(),
        UpsertOutcome::Appended
    );
    store.flush().await.unwrap();

    assert_eq!(rows.lock().unwrap().clone(), seed);
    assert!(reads.load(Ordering::SeqCst) > 0);
    assert_eq!(writes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_after_exactly_three_refreshes() {
    let mut transport = FakeSheetTransport::new(Vec::new());
    transport.fail_all_writes_unauthorized = true;
    let tokens = CountingTokens::new();
    let refreshes = tokens.refreshes.clone();

    let mut store = SheetStore::new(Box::new(transport), Box::new(tokens), false, false, 1);

    // empty sheet forces a header write, which keeps failing with 401
    let result = store.prepare().await;
    match result {
        Err(StoreError::Auth(_)) => {}
        other => panic!("expected an auth failure, got {:?}", other),
    }

    assert_eq!(refreshes.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_calls_are_retried() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    transport.write_failures.lock().unwrap().push_back(TransportError::RateLimited {
        retry_after: Some(1),
    });
    transport
        .write_failures
        .lock()
        .unwrap()
        .push_back(TransportError::RateLimited { retry_after: None });
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 1);

    let outcome = store.upsert(&record("http://x/1", "tagB")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Appended);
    assert_eq!(rows.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    transport
        .write_failures
        .lock()
        .unwrap()
        .push_back(TransportError::Transient("server error 502".to_string()));
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 1);

    let outcome = store.upsert(&record("http://x/1", "tagB")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Appended);
    assert_eq!(rows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_fatal_api_error_propagates() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    transport.write_failures.lock().unwrap().push_back(TransportError::Fatal {
        status: 404,
        message: "spreadsheet not found".to_string(),
    });
    let mut store = store_over(transport, false, false, 1);

    match store.upsert(&record("http://x/1", "tagB")).await {
        Err(StoreError::Api { status: 404, .. }) => {}
        other => panic!("expected a fatal api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_batched_appends_commit_on_flush() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, false, false, 3);

    assert_eq!(
        store.upsert(&record("http://x/1", "tagB")).await.unwrap(),
        UpsertOutcome::Buffered
    );
    assert_eq!(
        store.upsert(&record("http://x/2", "tagB")).await.unwrap(),
        UpsertOutcome::Buffered
    );
    // nothing committed yet
    assert_eq!(rows.lock().unwrap().len(), 1);

    // the third buffered row fills the batch and triggers the append
    assert_eq!(
        store.upsert(&record("http://x/3", "tagB")).await.unwrap(),
        UpsertOutcome::Buffered
    );
    assert_eq!(rows.lock().unwrap().len(), 4);

    store.flush().await.unwrap();
    assert_eq!(rows.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_buffered_rows_dedup_within_the_batch() {
    let transport = FakeSheetTransport::new(vec![header_row()]);
    let rows = transport.rows.clone();
    let mut store = store_over(transport, true, false, 10);

    assert_eq!(
        store.upsert(&record("http://x/1", "tagA")).await.unwrap(),
        UpsertOutcome::Buffered
    );
    // the same permalink again merges into the buffered row
    assert_eq!(
        store.upsert(&record("http://x/1", "tagB")).await.unwrap(),
        UpsertOutcome::Buffered
    );

    store.flush().await.unwrap();

    let snapshot = rows.lock().unwrap().clone();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1][URL_COLUMN], "http://x/1");
    // the first upsert auto-approved with tagA; the merge kept that decision
    assert_eq!(snapshot[1][USABLE_TAG_COLUMN], "tagA");
    assert_eq!(snapshot[1][1], "tagB");
}
