use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;

use crate::{
    config,
    license::ALL_RIGHTS_RESERVED,
    providers::{Provider, ProviderError, retry_after_secs},
    types::{InstagramMedia, InstagramRecentResponse, PhotoRecord, ProviderKind},
    warning,
};

const MAX_GATEWAY_RETRIES: u32 = 3;
const MAX_RATE_RETRIES: u32 = 5;

/// Instagram-like recent media provider.
///
/// Pulls the recent media feed for a tag and follows the `max_tag_id`
/// continuation until the API stops returning one. No license metadata is
/// exposed by the API, so every record is "all rights reserved".
pub struct InstagramProvider {
    key: String,
    client: Client,
}

impl InstagramProvider {
    pub fn new(key: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(InstagramProvider { key, client })
    }
}

#[async_trait]
impl Provider for InstagramProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Instagram
    }

    async fn search(&self, tag: &str) -> Result<Vec<PhotoRecord>, ProviderError> {
        let mut records: Vec<PhotoRecord> = Vec::new();
        let mut max_tag_id: Option<String> = None;
        let mut gateway_retries = 0;
        let mut rate_retries = 0;

        loop {
            let mut api_url = format!(
                "{uri}/tags/{tag}/media/recent?client_id={key}",
                uri = &config::instagram_api_url(),
                tag = urlencoding::encode(tag),
                key = self.key
            );
            if let Some(id) = &max_tag_id {
                api_url.push_str(&format!("&max_tag_id={}", id));
            }

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
                    "Instagram keeps rate limiting this search, giving up with {} records.",
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
            if response.status() == StatusCode::BAD_REQUEST
                || response.status() == StatusCode::UNAUTHORIZED
                || response.status() == StatusCode::FORBIDDEN
            {
                return Err(ProviderError::Credentials(
                    "recent media request rejected, check --instagram-key".to_string(),
                ));
            }
            if !response.status().is_success() {
                return Err(ProviderError::Api {
                    status: response.status().as_u16(),
                    message: format!("recent media for '{}' failed", tag),
                });
            }

            let page: InstagramRecentResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Contract(e.to_string()))?;

            for media in &page.data {
                if let Some(record) = record_from_media(media, tag) {
                    records.push(record);
                }
            }

            match page.pagination.and_then(|p| p.next_max_tag_id) {
                Some(next) => max_tag_id = Some(next),
                None => break,
            }
        }

        Ok(records)
    }
}

/// Normalizes one media entry into a [`PhotoRecord`].
///
/// Entries without image renditions or without a parseable creation time
/// yield `None` and are skipped.
fn record_from_media(media: &InstagramMedia, tag: &str) -> Option<PhotoRecord> {
    let images = media.images.as_ref()?;
    let standard = images.standard_resolution.as_ref()?;
    let taken_at = parse_created_time(&media.created_time)?;

    let small = images
        .low_resolution
        .as_ref()
        .map(|i| i.url.clone())
        .unwrap_or_else(|| standard.url.clone());

    Some(PhotoRecord {
        provider: ProviderKind::Instagram,
        tag: tag.to_string(),
        taken_at,
        username: media.user.username.clone(),
        usable_tag: String::new(),
        image_url: standard.url.clone(),
        image_url_medium: standard.url.clone(),
        image_url_small: small,
        source_url: media.link.clone(),
        license: ALL_RIGHTS_RESERVED.to_string(),
        title: media
            .caption
            .as_ref()
            .map(|c| c.text.clone())
            .unwrap_or_else(|| "Untitled".to_string()),
    })
}

// Unix epoch seconds as a string.
fn parse_created_time(created_time: &str) -> Option<DateTime<Utc>> {
    let secs = created_time.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}
