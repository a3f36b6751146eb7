use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;

use crate::{
    config,
    management::TokenSupplier,
    store::{
        HEADERS, StoreError, TabularStore, URL_COLUMN, USABLE_TAG_COLUMN, UpsertOutcome,
        merge_usable_tag,
    },
    types::{PhotoRecord, ValueRange},
    utils,
};

const SHEET_NAME: &str = "Sheet1";
const FIRST_DATA_ROW: usize = 2;

const MAX_TOKEN_REFRESHES: u32 = 3;
const MAX_RATE_RETRIES: u32 = 5;
const MAX_TRANSIENT_RETRIES: u32 = 3;

#[derive(Debug)]
pub enum TransportError {
    Unauthorized,
    RateLimited { retry_after: Option<u64> },
    Transient(String),
    Fatal { status: u16, message: String },
}

/// Low-level access to a values-oriented spreadsheet API.
///
/// Ranges use A1 notation. The token is passed per call so the store can
/// swap in a freshly refreshed one on retry. Implementations classify
/// failures into [`TransportError`] so the retry discipline above them can
/// stay transport-agnostic.
#[async_trait]
pub trait SheetsTransport: Send + Sync {
    async fn read_range(&self, token: &str, range: &str)
    -> Result<Vec<Vec<String>>, TransportError>;

    async fn update_range(
        &self,
        token: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), TransportError>;

    async fn append_rows(
        &self,
        token: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), TransportError>;
}

pub struct HttpSheetsTransport {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
}

impl HttpSheetsTransport {
    pub fn new(spreadsheet_id: String) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Contract(e.to_string()))?;
        Ok(HttpSheetsTransport {
            client,
            base_url: config::sheets_api_url(),
            spreadsheet_id,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{base}/{id}/values/{range}",
            base = self.base_url,
            id = self.spreadsheet_id,
            range = urlencoding::encode(range)
        )
    }

    async fn classify(response: reqwest::Response) -> TransportError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return TransportError::Unauthorized;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return TransportError::RateLimited { retry_after };
        }
        if status.is_server_error() {
            return TransportError::Transient(format!("server error {}", status));
        }
        let message = response.text().await.unwrap_or_default();
        TransportError::Fatal {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl SheetsTransport for HttpSheetsTransport {
    async fn read_range(
        &self,
        token: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, TransportError> {
        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        let values: ValueRange = response
            .json()
            .await
            .map_err(|e| TransportError::Fatal {
                status: 200,
                message: e.to_string(),
            })?;
        Ok(values.values)
    }

    async fn update_range(
        &self,
        token: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), TransportError> {
        let body = ValueRange {
            range: Some(range.to_string()),
            values: rows.to_vec(),
        };
        let url = format!("{}?valueInputOption=RAW", self.values_url(range));
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        token: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), TransportError> {
        let body = ValueRange {
            range: Some(range.to_string()),
            values: rows.to_vec(),
        };
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(range)
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(())
    }
}

enum SheetCall<'a> {
    Read(&'a str),
    Update(&'a str, &'a [Vec<String>]),
    Append(&'a str, &'a [Vec<String>]),
}

struct PendingRow {
    url: String,
    cells: Vec<String>,
}

/// Read-modify-write spreadsheet store.
///
/// Dedup is column-scoped: an upsert scans only the `url` column to locate
/// an existing row, then reads only that row's `usable_tag` cell before
/// deciding what to write. Updates are targeted single-row writes; appends
/// let the remote end pick the next row so no local row count can race a
/// concurrent editor.
pub struct SheetStore {
    transport: Box<dyn SheetsTransport>,
    tokens: Box<dyn TokenSupplier>,
    auto_approve: bool,
    debug: bool,
    batch_rows: usize,
    pending: Vec<PendingRow>,
}

impl SheetStore {
    pub fn new(
        transport: Box<dyn SheetsTransport>,
        tokens: Box<dyn TokenSupplier>,
        auto_approve: bool,
        debug: bool,
        batch_rows: usize,
    ) -> Self {
        SheetStore {
            transport,
            tokens,
            auto_approve,
            debug,
            batch_rows: batch_rows.max(1),
            pending: Vec::new(),
        }
    }

    fn header_range() -> String {
        format!(
            "{sheet}!A1:{last}1",
            sheet = SHEET_NAME,
            last = utils::column_letter(HEADERS.len() - 1)
        )
    }

    fn url_column_range() -> String {
        let col = utils::column_letter(URL_COLUMN);
        format!(
            "{sheet}!{col}{row}:{col}",
            sheet = SHEET_NAME,
            col = col,
            row = FIRST_DATA_ROW
        )
    }

    fn usable_tag_cell(row: usize) -> String {
        format!(
            "{sheet}!{col}{row}",
            sheet = SHEET_NAME,
            col = utils::column_letter(USABLE_TAG_COLUMN),
            row = row
        )
    }

    fn row_range(row: usize) -> String {
        format!(
            "{sheet}!A{row}:{last}{row}",
            sheet = SHEET_NAME,
            row = row,
            last = utils::column_letter(HEADERS.len() - 1)
        )
    }

    /// Executes one remote call under the bounded retry discipline.
    ///
    /// The explicit loop distinguishes three retryable outcomes:
    ///
    /// - authorization failure: refresh the token and repeat the identical
    ///   call, at most 3 refreshes with attempt² second backoff, then give
    ///   up with a store-wide auth error;
    /// - rate limit: sleep for the advertised `Retry-After` (or an
    ///   exponential fallback with jitter) and repeat, bounded;
    /// - transient server/connection error: exponential backoff with
    ///   jitter, bounded.
    ///
    /// Anything else is fatal for the sync and propagates immediately.
    async fn call_with_retry(&mut self, call: SheetCall<'_>) -> Result<Vec<Vec<String>>, StoreError> {
        let mut refreshes = 0u32;
        let mut rate_attempts = 0u32;
        let mut transient_attempts = 0u32;

        loop {
            let token = self.tokens.token().await?;
            let result = match &call {
                SheetCall::Read(range) => self.transport.read_range(&token, range).await,
                SheetCall::Update(range, rows) => self
                    .transport
                    .update_range(&token, range, rows)
                    .await
                    .map(|_| Vec::new()),
                SheetCall::Append(range, rows) => self
                    .transport
                    .append_rows(&token, range, rows)
                    .await
                    .map(|_| Vec::new()),
            };

            match result {
                Ok(values) => return Ok(values),
                Err(TransportError::Unauthorized) => {
                    if refreshes >= MAX_TOKEN_REFRESHES {
                        return Err(StoreError::Auth(format!(
                            "access still denied after {} token refreshes",
                            MAX_TOKEN_REFRESHES
                        )));
                    }
                    refreshes += 1;
                    sleep(Duration::from_secs((refreshes * refreshes) as u64)).await;
                    self.tokens.refresh().await?;
                }
                Err(TransportError::RateLimited { retry_after }) => {
                    if rate_attempts >= MAX_RATE_RETRIES {
                        return Err(StoreError::RateLimited(format!(
                            "still rate limited after {} retries",
                            MAX_RATE_RETRIES
                        )));
                    }
                    rate_attempts += 1;
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| utils::backoff_with_jitter(rate_attempts));
                    sleep(delay).await;
                }
                Err(TransportError::Transient(message)) => {
                    if transient_attempts >= MAX_TRANSIENT_RETRIES {
                        return Err(StoreError::Api {
                            status: 0,
                            message,
                        });
                    }
                    transient_attempts += 1;
                    sleep(utils::backoff_with_jitter(transient_attempts)).await;
                }
                Err(TransportError::Fatal { status, message }) => {
                    return Err(StoreError::Api { status, message });
                }
            }
        }
    }

    async fn flush_pending(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let rows: Vec<Vec<String>> = self.pending.drain(..).map(|p| p.cells).collect();
        let range = Self::header_range();
        self.call_with_retry(SheetCall::Append(&range, &rows))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TabularStore for SheetStore {
    /// Makes sure the header row is present, writing it only when the
    /// sheet is still empty (and never in debug mode).
    async fn prepare(&mut self) -> Result<(), StoreError> {
        let range = Self::header_range();
        let existing = self.call_with_retry(SheetCall::Read(&range)).await?;

        let has_header = existing
            .first()
            .map(|row| !row.is_empty())
            .unwrap_or(false);
        if has_header || self.debug {
            return Ok(());
        }

        let header: Vec<Vec<String>> = vec![HEADERS.iter().map(|h| h.to_string()).collect()];
        self.call_with_retry(SheetCall::Update(&range, &header))
            .await?;
        Ok(())
    }

    /// Merges one harvested record into the sheet.
    ///
    /// The permalink is looked up in the `url` column only. When a row
    /// exists, its `usable_tag` cell is read back and, when non-empty, wins
    /// over whatever the harvester brought along: human curation survives
    /// every re-sync. The row is then rewritten in place. Unknown
    /// permalinks become appends, either immediately or through the
    /// configured append batch. Debug mode performs every read and skips
    /// every write.
    async fn upsert(&mut self, record: &PhotoRecord) -> Result<UpsertOutcome, StoreError> {
        // a row waiting in the append batch is merged there, not appended twice
        if let Some(index) = self
            .pending
            .iter()
            .position(|p| p.url == record.source_url)
        {
            let existing = self.pending[index].cells[USABLE_TAG_COLUMN].clone();
            let mut cells = record.to_row();
            cells[USABLE_TAG_COLUMN] =
                merge_usable_tag(Some(&existing), self.auto_approve, &record.tag);
            self.pending[index].cells = cells;
            return Ok(UpsertOutcome::Buffered);
        }

        let url_range = Self::url_column_range();
        let url_cells = self.call_with_retry(SheetCall::Read(&url_range)).await?;
        let position = url_cells
            .iter()
            .position(|row| row.first().map(|c| c == &record.source_url).unwrap_or(false));

        match position {
            Some(index) => {
                let row = FIRST_DATA_ROW + index;
                let tag_range = Self::usable_tag_cell(row);
                let tag_cells = self.call_with_retry(SheetCall::Read(&tag_range)).await?;
                let existing = tag_cells.first().and_then(|r| r.first()).cloned();

                let mut cells = record.to_row();
                cells[USABLE_TAG_COLUMN] =
                    merge_usable_tag(existing.as_deref(), self.auto_approve, &record.tag);

                if !self.debug {
                    let range = Self::row_range(row);
                    self.call_with_retry(SheetCall::Update(&range, &[cells]))
                        .await?;
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let mut cells = record.to_row();
                cells[USABLE_TAG_COLUMN] = merge_usable_tag(None, self.auto_approve, &record.tag);

                if self.debug {
                    return Ok(UpsertOutcome::Appended);
                }

                if self.batch_rows <= 1 {
                    let range = Self::header_range();
                    self.call_with_retry(SheetCall::Append(&range, &[cells]))
                        .await?;
                    return Ok(UpsertOutcome::Appended);
                }

                self.pending.push(PendingRow {
                    url: record.source_url.clone(),
                    cells,
                });
                if self.pending.len() >= self.batch_rows {
                    self.flush_pending().await?;
                }
                Ok(UpsertOutcome::Buffered)
            }
        }
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        self.flush_pending().await
    }
}
