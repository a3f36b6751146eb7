use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::{
    config,
    license::ALL_RIGHTS_RESERVED,
    providers::{Provider, ProviderError, retry_after_secs},
    types::{BearerTokenResponse, PhotoRecord, ProviderKind, Tweet, TweetSearchResponse},
    warning,
};

// Search endpoint maximum.
const PAGE_SIZE: u32 = 100;
const MAX_GATEWAY_RETRIES: u32 = 3;
const MAX_RATE_RETRIES: u32 = 5;

/// Twitter-like search provider.
///
/// Searches recent photo tweets for a tag (retweets excluded) and walks the
/// `max_id` cursor until the API returns an empty page. The application
/// bearer token is exchanged once, on first use, and reused for every
/// subsequent request in the process.
pub struct TwitterProvider {
    key: String,
    secret: String,
    client: Client,
    bearer: Mutex<Option<String>>,
}

impl TwitterProvider {
    pub fn new(key: String, secret: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(TwitterProvider {
            key,
            secret,
            client,
            bearer: Mutex::new(None),
        })
    }

    /// Returns the cached application bearer token, performing the
    /// key:secret exchange on the first call.
    async fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.bearer.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let basic = STANDARD.encode(format!("{}:{}", self.key, self.secret));
        let response = self
            .client
            .post(&config::twitter_token_url())
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED || response.status() == StatusCode::FORBIDDEN
        {
            return Err(ProviderError::Credentials(
                "bearer token exchange rejected, check --twitter-key/--twitter-secret".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
                message: "bearer token exchange failed".to_string(),
            });
        }

        let token: BearerTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Contract(e.to_string()))?;
        if token.token_type != "bearer" {
            return Err(ProviderError::Contract(format!(
                "unexpected token_type '{}'",
                token.token_type
            )));
        }

        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

#[async_trait]
impl Provider for TwitterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Twitter
    }

    async fn search(&self, tag: &str) -> Result<Vec<PhotoRecord>, ProviderError> {
        let token = self.bearer_token().await?;

        let mut records: Vec<PhotoRecord> = Vec::new();
        let mut max_id: Option<u64> = None;
        let mut gateway_retries = 0;
        let mut rate_retries = 0;

        loop {
            let query = urlencoding::encode(&format!("{} -rt", tag)).into_owned();
            let mut api_url = format!(
                "{uri}/search/tweets.json?q={q}&result_type=recent&count={count}&include_entities=true",
                uri = &config::twitter_api_url(),
                q = query,
                count = PAGE_SIZE
            );
            if let Some(id) = max_id {
                api_url.push_str(&format!("&max_id={}", id));
            }

            let response = self
                .client
                .get(&api_url)
                .bearer_auth(&token)
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
                    "Twitter keeps rate limiting this search, giving up with {} records.",
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
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ProviderError::Credentials(
                    "search request rejected, bearer token invalid".to_string(),
                ));
            }
            if !response.status().is_success() {
                return Err(ProviderError::Api {
                    status: response.status().as_u16(),
                    message: format!("search for '{}' failed", tag),
                });
            }

            let page: TweetSearchResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Contract(e.to_string()))?;
            if page.statuses.is_empty() {
                break;
            }

            let page_len = page.statuses.len();
            let oldest = page.statuses.iter().map(|t| t.id).min().unwrap_or(0);
            for tweet in &page.statuses {
                if let Some(record) = record_from_tweet(tweet, tag) {
                    records.push(record);
                }
            }

            if oldest <= 1 || page_len < PAGE_SIZE as usize {
                break;
            }
            max_id = Some(oldest - 1);
        }

        Ok(records)
    }
}

/// Normalizes one tweet into a [`PhotoRecord`].
///
/// Tweets without an attached photo, without any usable size variant, or
/// with an unparseable creation time yield `None` and are skipped.
fn record_from_tweet(tweet: &Tweet, tag: &str) -> Option<PhotoRecord> {
    let media = tweet.entities.as_ref()?.media.as_ref()?.first()?;

    let max_size = if media.sizes.large.is_some() {
        "large"
    } else if media.sizes.medium.is_some() {
        "medium"
    } else if media.sizes.small.is_some() {
        "small"
    } else {
        return None;
    };

    let taken_at = parse_created_at(&tweet.created_at)?;

    Some(PhotoRecord {
        provider: ProviderKind::Twitter,
        tag: tag.to_string(),
        taken_at,
        username: tweet.user.name.clone(),
        usable_tag: String::new(),
        image_url: format!("{}:{}", media.media_url_https, max_size),
        image_url_medium: format!("{}:medium", media.media_url_https),
        image_url_small: format!("{}:small", media.media_url_https),
        source_url: format!(
            "https://twitter.com/{user}/status/{id}",
            user = tweet.user.screen_name,
            id = tweet.id
        ),
        license: ALL_RIGHTS_RESERVED.to_string(),
        title: tweet.text.clone(),
    })
}

// "Wed Aug 27 13:08:45 +0000 2008"
fn parse_created_at(created_at: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(created_at, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
