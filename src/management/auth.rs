use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use reqwest::Client;

use crate::types::{StoreCredentials, Token};

#[derive(Debug)]
pub enum AuthError {
    IoError(std::io::Error),
    HttpError(String),
    ContractError(String),
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::IoError(err)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::IoError(e) => write!(f, "credential io error: {}", e),
            AuthError::HttpError(e) => write!(f, "token endpoint error: {}", e),
            AuthError::ContractError(e) => write!(f, "malformed token response: {}", e),
        }
    }
}

/// Supplies an opaque bearer token for the remote store.
///
/// `token` returns a cached token when one is present and not yet expired;
/// `refresh` always exchanges the configured credentials for a fresh one.
/// The bounded refresh-and-retry discipline on authorization failures lives
/// in the store, not here.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn token(&mut self) -> Result<String, AuthError>;
    async fn refresh(&mut self) -> Result<String, AuthError>;
}

pub struct TokenManager {
    credentials: StoreCredentials,
    token: Option<Token>,
    client: Client,
}

impl TokenManager {
    pub fn new(credentials: StoreCredentials) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::HttpError(e.to_string()))?;
        Ok(TokenManager {
            credentials,
            token: None,
            client,
        })
    }

    pub async fn from_key_file(path: &str) -> Result<Self, AuthError> {
        let content = async_fs::read_to_string(path).await?;
        let credentials: StoreCredentials =
            serde_json::from_str(&content).map_err(|e| AuthError::ContractError(e.to_string()))?;
        Self::new(credentials)
    }

    async fn load_cached(&mut self) -> Option<Token> {
        let content = async_fs::read_to_string(Self::token_path()).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    async fn persist(&self) -> Result<(), AuthError> {
        let path = Self::token_path();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.token)
            .map_err(|e| AuthError::ContractError(e.to_string()))?;
        async_fs::write(path, json).await.map_err(AuthError::from)
    }

    fn is_expired(token: &Token) -> bool {
        let now = Utc::now().timestamp() as u64;
        now >= token.obtained_at + token.expires_in.saturating_sub(60)
    }

    fn token_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("tagsync/cache/store-token.json");
        path
    }
}

#[async_trait]
impl TokenSupplier for TokenManager {
    async fn token(&mut self) -> Result<String, AuthError> {
        if self.token.is_none() {
            self.token = self.load_cached().await;
        }

        match &self.token {
            Some(token) if !Self::is_expired(token) => Ok(token.access_token.clone()),
            _ => self.refresh().await,
        }
    }

    async fn refresh(&mut self) -> Result<String, AuthError> {
        let basic = STANDARD.encode(format!(
            "{id}:{secret}",
            id = self.credentials.client_id,
            secret = self.credentials.client_secret
        ));

        let res = self
            .client
            .post(&self.credentials.token_uri)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AuthError::HttpError(e.to_string()))?;

        if !res.status().is_success() {
            return Err(AuthError::HttpError(format!(
                "token endpoint returned {}",
                res.status()
            )));
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| AuthError::ContractError(e.to_string()))?;

        let access_token = json["access_token"]
            .as_str()
            .ok_or_else(|| AuthError::ContractError("access_token missing".to_string()))?
            .to_string();

        self.token = Some(Token {
            access_token: access_token.clone(),
            expires_in: json["expires_in"].as_u64().unwrap_or(3600),
            obtained_at: Utc::now().timestamp() as u64,
        });
        let _ = self.persist().await;

        Ok(access_token)
    }
}
