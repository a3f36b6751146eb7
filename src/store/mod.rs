//! # Tabular Store Module
//!
//! This module provides the durable backends harvested records are
//! synchronized into: a local append-only CSV file and a remote,
//! human-editable spreadsheet. Both speak the same canonical column order
//! and both are driven one record at a time by the sync driver.
//!
//! The two backends deliberately differ in how much they care about
//! history:
//!
//! - the CSV variant is a pure observation log: every harvested record is
//!   appended, duplicates and all;
//! - the spreadsheet variant dedups by permalink and merges into existing
//!   rows, preserving any curation a human has done in the `usable_tag`
//!   column.

mod csv;
mod sheet;

pub use csv::CsvStore;
pub use sheet::HttpSheetsTransport;
pub use sheet::SheetStore;
pub use sheet::SheetsTransport;
pub use sheet::TransportError;

use async_trait::async_trait;

use crate::{management::AuthError, types::PhotoRecord};

/// Canonical column order shared by the CSV header, the spreadsheet header
/// row, and [`PhotoRecord::to_row`].
pub const HEADERS: [&str; 11] = [
    "provider",
    "tag",
    "datetime",
    "username",
    "usable_tag",
    "image_url",
    "url",
    "image_url_s",
    "image_url_m",
    "license",
    "title",
];

/// Position of the dedup key column within [`HEADERS`].
pub const URL_COLUMN: usize = 6;

/// Position of the human-curated approval column within [`HEADERS`].
pub const USABLE_TAG_COLUMN: usize = 4;

#[derive(Debug)]
pub enum StoreError {
    Auth(String),
    Api { status: u16, message: String },
    RateLimited(String),
    Io(std::io::Error),
    Contract(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<AuthError> for StoreError {
    fn from(err: AuthError) -> Self {
        StoreError::Auth(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Auth(msg) => write!(f, "store authorization failed: {}", msg),
            StoreError::Api { status, message } => {
                write!(f, "store api error (status {}): {}", status, message)
            }
            StoreError::RateLimited(msg) => write!(f, "store rate limit exhausted: {}", msg),
            StoreError::Io(e) => write!(f, "store io error: {}", e),
            StoreError::Contract(msg) => write!(f, "malformed store response: {}", msg),
        }
    }
}

/// What an upsert did with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was committed to the store.
    Appended,
    /// An existing row with the same permalink was rewritten in place.
    Updated,
    /// A new row joined the local append batch; it commits on flush.
    Buffered,
}

/// A durable, human-editable table of harvested photo records.
///
/// `prepare` makes sure the header row exists, `upsert` merges one record,
/// `flush` commits anything an implementation chose to batch. Writes to a
/// single store are strictly sequential; the spreadsheet upsert is a
/// check-then-act sequence that must not interleave.
#[async_trait]
pub trait TabularStore: Send {
    async fn prepare(&mut self) -> Result<(), StoreError>;

    async fn upsert(&mut self, record: &PhotoRecord) -> Result<UpsertOutcome, StoreError>;

    async fn flush(&mut self) -> Result<(), StoreError>;
}

/// Resolves the `usable_tag` cell for a record being written.
///
/// A non-empty resident value always wins; it records a human decision and
/// survives any number of re-syncs. Only when nothing is recorded yet and
/// auto-approval is on does the harvester fill in the searched tag.
pub fn merge_usable_tag(existing: Option<&str>, auto_approve: bool, tag: &str) -> String {
    match existing {
        Some(resident) if !resident.trim().is_empty() => resident.to_string(),
        _ if auto_approve => tag.to_string(),
        _ => String::new(),
    }
}
