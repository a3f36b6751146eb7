use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Twitter,
    Flickr,
    Instagram,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Twitter => write!(f, "Twitter"),
            ProviderKind::Flickr => write!(f, "Flickr"),
            ProviderKind::Instagram => write!(f, "Instagram"),
        }
    }
}

/// One harvested photo observation, normalized across providers.
///
/// `source_url` is the canonical permalink and the only field used for
/// dedup. `usable_tag` records a human curation decision and is never
/// overwritten by the harvester once non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub provider: ProviderKind,
    pub tag: String,
    pub taken_at: DateTime<Utc>,
    pub username: String,
    pub usable_tag: String,
    pub image_url: String,
    pub image_url_medium: String,
    pub image_url_small: String,
    pub source_url: String,
    pub license: String,
    pub title: String,
}

impl PhotoRecord {
    /// Projects the record into the canonical column order shared by the
    /// CSV files and the spreadsheet layout.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.provider.to_string(),
            self.tag.clone(),
            self.taken_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.username.clone(),
            self.usable_tag.clone(),
            self.image_url.clone(),
            self.source_url.clone(),
            self.image_url_small.clone(),
            self.image_url_medium.clone(),
            self.license.clone(),
            self.title.clone(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

#[derive(Tabled)]
pub struct SummaryTableRow {
    pub provider: String,
    pub tag: String,
    pub harvested: usize,
    pub appended: usize,
    pub updated: usize,
    pub buffered: usize,
}

// --- Twitter-like search API payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetSearchResponse {
    pub statuses: Vec<Tweet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: u64,
    pub created_at: String,
    pub text: String,
    pub user: TweetUser,
    pub entities: Option<TweetEntities>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetUser {
    pub name: String,
    pub screen_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetEntities {
    pub media: Option<Vec<TweetMedia>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetMedia {
    pub media_url_https: String,
    pub sizes: TweetMediaSizes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetMediaSizes {
    pub large: Option<serde_json::Value>,
    pub medium: Option<serde_json::Value>,
    pub small: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerTokenResponse {
    pub token_type: String,
    pub access_token: String,
}

// --- Flickr-like search API payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlickrSearchResponse {
    pub photos: Option<FlickrPhotoPage>,
    pub stat: String,
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlickrPhotoPage {
    pub page: u32,
    pub pages: u32,
    pub photo: Vec<FlickrPhoto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlickrPhoto {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub ownername: Option<String>,
    pub datetaken: Option<String>,
    pub license: Option<String>,
    pub url_o: Option<String>,
    pub url_l: Option<String>,
    pub url_c: Option<String>,
    pub url_m: Option<String>,
}

// --- Instagram-like recent media API payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramRecentResponse {
    pub data: Vec<InstagramMedia>,
    pub pagination: Option<InstagramPagination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramPagination {
    pub next_max_tag_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramMedia {
    pub link: String,
    pub created_time: String,
    pub user: InstagramUser,
    pub images: Option<InstagramImages>,
    pub caption: Option<InstagramCaption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramUser {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramImages {
    pub standard_resolution: Option<InstagramImage>,
    pub low_resolution: Option<InstagramImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramCaption {
    pub text: String,
}
