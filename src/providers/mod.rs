//! # Provider Integration Module
//!
//! This module provides the search API clients for every supported social
//! media source. It is the primary integration layer between tagsync and the
//! remote photo services, handling HTTP communication, pagination, rate
//! limiting, and normalization of heterogeneous API payloads into the common
//! [`PhotoRecord`] shape.
//!
//! ## Overview
//!
//! Each provider implements the [`Provider`] trait: a single `search`
//! operation that takes a tag and returns every recent photo observation the
//! remote API is willing to hand out for it. Callers never see raw provider
//! payloads, provider license codes, or pagination cursors; all of that is
//! internal to the provider.
//!
//! ## Architecture
//!
//! ```text
//! Sync Driver
//!      ↓
//! Provider Integration Layer
//!     ├── Twitter-like search (bearer token, max_id cursor)
//!     ├── Flickr-like search (api key, numbered pages)
//!     └── Instagram-like recent media (client id, max_tag_id cursor)
//!      ↓
//! HTTP Layer (reqwest, JSON)
//!      ↓
//! Remote Search APIs
//! ```
//!
//! ## Client Lifecycle
//!
//! Every provider owns exactly one HTTP client, constructed when the
//! provider is constructed and reused for every page of every search. The
//! Twitter-like provider additionally performs its application bearer token
//! exchange lazily on the first search and caches the result for the
//! lifetime of the process, so repeated searches never repeat the
//! handshake.
//!
//! ## Pagination
//!
//! A search drains the provider's pagination to exhaustion before
//! returning, using whatever cursor convention the provider defines (an
//! opaque `max_id`, a page number, a `max_tag_id` continuation). Page sizes
//! are the provider maximum to keep the round-trip count down.
//!
//! ## Error Handling Philosophy
//!
//! - **Item-level problems never abort a search.** A photo without media,
//!   without a parseable capture time, or with an otherwise malformed entry
//!   is skipped and the rest of the page is processed.
//! - **Rate limiting is retried.** 429 responses honor the `Retry-After`
//!   header for delays up to 120 seconds; anything longer is reported and
//!   the search gives up rather than stalling the whole run.
//! - **Transient gateway errors are retried** a bounded number of times
//!   with a fixed delay.
//! - **Credential and contract failures are fatal** for the provider and
//!   surface as a [`ProviderError`] to the caller.
//!
//! ## License Normalization
//!
//! Providers that report license codes run them through [`crate::license`]
//! before the record leaves the provider; providers without license
//! metadata report "all rights reserved".

mod flickr;
mod instagram;
mod twitter;

pub use flickr::FlickrProvider;
pub use instagram::InstagramProvider;
pub use twitter::TwitterProvider;

use async_trait::async_trait;

use crate::types::{PhotoRecord, ProviderKind};

#[derive(Debug)]
pub enum ProviderError {
    Credentials(String),
    Api { status: u16, message: String },
    Network(String),
    Contract(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Credentials(msg) => write!(f, "credentials rejected: {}", msg),
            ProviderError::Api { status, message } => {
                write!(f, "api error (status {}): {}", status, message)
            }
            ProviderError::Network(msg) => write!(f, "network error: {}", msg),
            ProviderError::Contract(msg) => write!(f, "malformed api response: {}", msg),
        }
    }
}

/// One external photo metadata source.
///
/// `search` is finite and single-pass: it issues fresh network pagination
/// on every invocation and returns once the provider reports no further
/// pages. Records with no determinable capture time are already filtered
/// out of the result.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn search(&self, tag: &str) -> Result<Vec<PhotoRecord>, ProviderError>;
}

/// Reads the `Retry-After` header of a rate-limited response, defaulting
/// to zero when absent or unparseable.
pub(crate) fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}
