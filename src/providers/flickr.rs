use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;

use crate::{
    config, license,
    providers::{Provider, ProviderError, retry_after_secs},
    types::{FlickrPhoto, FlickrSearchResponse, PhotoRecord, ProviderKind},
    warning,
};

// Search endpoint maximum.
const PER_PAGE: u32 = 500;
const MAX_GATEWAY_RETRIES: u32 = 3;
const MAX_RATE_RETRIES: u32 = 5;

// Extra photo attributes requested alongside every search page.
const EXTRAS: &str = "url_o,url_l,url_m,url_c,owner_name,date_taken,license";

// Flickr signals an invalid api key with this application-level code.
const CODE_INVALID_KEY: i32 = 100;

/// Flickr-like search provider.
///
/// Walks numbered result pages at the maximum page size until the reported
/// page count is exhausted. License codes are normalized through the
/// license codec before records leave the provider.
pub struct FlickrProvider {
    key: String,
    client: Client,
}

impl FlickrProvider {
    pub fn new(key: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(FlickrProvider { key, client })
    }
}

#[async_trait]
impl Provider for FlickrProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Flickr
    }

    async fn search(&self, tag: &str) -> Result<Vec<PhotoRecord>, ProviderError> {
        let mut records: Vec<PhotoRecord> = Vec::new();
        let mut page = 1u32;
        let mut gateway_retries = 0;
        let mut rate_retries = 0;

        loop {
            let api_url = format!(
                "{uri}?method=flickr.photos.search&api_key={key}&tags={tags}&per_page={per_page}&page={page}&extras={extras}&format=json&nojsoncallback=1",
                uri = &config::flickr_api_url(),
                key = self.key,
                tags = urlencoding::encode(tag),
                per_page = PER_PAGE,
                page = page,
                extras = EXTRAS
            );

            let response = self
                .client
                .get(&api_url)
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = retry_after_secs(&response);
                if retry_after <= 120 && rate_retries < MAX_RATE_RETRIES {
                    rate_retries += 1;
                    sleep(Duration::from_secs(retry_after)).await;
                    continue;
                }
                warning!(
                    "Flickr keeps rate limiting this search, giving up with {} records.",
                    records.len()
                );
                return Ok(records);
            }
            if response.status() == StatusCode::BAD_GATEWAY && gateway_retries < MAX_GATEWAY_RETRIES
            {
                gateway_retries += 1;
                sleep(Duration::from_secs(10)).await;
                continue;
            }
            if !response.status().is_success() {
                return Err(ProviderError::Api {
                    status: response.status().as_u16(),
                    message: format!("search for '{}' failed", tag),
                });
            }

            let result: FlickrSearchResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Contract(e.to_string()))?;

            if result.stat != "ok" {
                let message = result.message.unwrap_or_else(|| "unknown failure".to_string());
                if result.code == Some(CODE_INVALID_KEY) {
                    return Err(ProviderError::Credentials(message));
                }
                return Err(ProviderError::Api {
                    status: 200,
                    message,
                });
            }

            let page_data = match result.photos {
                Some(p) => p,
                None => {
                    return Err(ProviderError::Contract(
                        "search response carried no photo page".to_string(),
                    ));
                }
            };

            for photo in &page_data.photo {
                if let Some(record) = record_from_photo(photo, tag) {
                    records.push(record);
                }
            }

            if page_data.page >= page_data.pages {
                break;
            }
            page = page_data.page + 1;
        }

        Ok(records)
    }
}

/// Normalizes one search result photo into a [`PhotoRecord`].
///
/// Photos with a missing or unparseable capture time yield `None` and are
/// skipped. Image urls are optional on the wire and map to empty strings.
fn record_from_photo(photo: &FlickrPhoto, tag: &str) -> Option<PhotoRecord> {
    let taken_at = parse_date_taken(photo.datetaken.as_deref()?)?;

    Some(PhotoRecord {
        provider: ProviderKind::Flickr,
        tag: tag.to_string(),
        taken_at,
        username: photo
            .ownername
            .clone()
            .unwrap_or_else(|| photo.owner.clone()),
        usable_tag: String::new(),
        image_url: photo.url_o.clone().unwrap_or_default(),
        image_url_medium: photo.url_c.clone().unwrap_or_default(),
        image_url_small: photo.url_m.clone().unwrap_or_default(),
        source_url: format!(
            "http://flickr.com/photos/{owner}/{id}",
            owner = photo.owner,
            id = photo.id
        ),
        license: license::decode(photo.license.as_deref()).to_string(),
        title: photo.title.clone(),
    })
}

// "2014-08-16 14:03:55", no zone attached; treated as UTC.
fn parse_date_taken(datetaken: &str) -> Option<chrono::DateTime<Utc>> {
    NaiveDateTime::parse_from_str(datetaken, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
