//! Configuration management for the tagged photo harvester.
//!
//! This module handles loading and accessing configuration values from
//! environment variables and `.env` files. Provider credentials and the
//! spreadsheet settings can be given as CLI flags; every flag falls back to
//! an environment variable here so secrets can live in a `.env` file
//! instead of the shell history.
//!
//! The configuration system follows a hierarchical approach:
//! 1. CLI flags (highest priority, merged in by the CLI layer)
//! 2. Environment variables
//! 3. `.env` file in the local data directory
//! 4. Application defaults (endpoint URLs only, never credentials)

use dotenv;
use std::{env, path::PathBuf};

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the necessary directory structure if it doesn't exist and loads
/// environment variables from a `.env` file located in the platform-specific
/// local data directory under `tagsync/.env`. This allows users to store
/// API keys securely without hardcoding sensitive values.
///
/// # Directory Structure
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/tagsync/.env`
/// - macOS: `~/Library/Application Support/tagsync/.env`
/// - Windows: `%LOCALAPPDATA%/tagsync/.env`
///
/// A missing `.env` file is not an error; credentials may equally well come
/// from the process environment or CLI flags.
///
/// # Errors
///
/// This function will return an error if the parent directory cannot be
/// created.
pub async fn load_env() -> Result<(), String> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tagsync/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    // absent file is fine, flags and plain env vars still work
    let _ = dotenv::from_path(path);
    Ok(())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Returns the Twitter API key (`TWITTER_API_KEY`), if configured.
pub fn twitter_key() -> Option<String> {
    env_opt("TWITTER_API_KEY")
}

/// Returns the Twitter API secret (`TWITTER_API_SECRET`), if configured.
pub fn twitter_secret() -> Option<String> {
    env_opt("TWITTER_API_SECRET")
}

/// Returns the Flickr API key (`FLICKR_API_KEY`), if configured.
pub fn flickr_key() -> Option<String> {
    env_opt("FLICKR_API_KEY")
}

/// Returns the Instagram client id (`INSTAGRAM_API_KEY`), if configured.
pub fn instagram_key() -> Option<String> {
    env_opt("INSTAGRAM_API_KEY")
}

/// Returns the path to the spreadsheet credentials JSON key file
/// (`GOOGLE_APPLICATION_CREDENTIALS`), if configured.
pub fn google_credentials() -> Option<String> {
    env_opt("GOOGLE_APPLICATION_CREDENTIALS")
}

/// Returns the target spreadsheet id (`GOOGLE_SPREADSHEET_ID`), if
/// configured. Selecting a spreadsheet id switches the store backend from
/// local CSV files to the remote spreadsheet.
pub fn google_spreadsheet_id() -> Option<String> {
    env_opt("GOOGLE_SPREADSHEET_ID")
}

/// Returns the Twitter-like search API base URL.
///
/// Overridable through `TWITTER_API_URL`, which is mainly useful for
/// pointing the client at a compatible self-hosted or mock endpoint.
pub fn twitter_api_url() -> String {
    env_opt("TWITTER_API_URL").unwrap_or_else(|| "https://api.twitter.com/1.1".to_string())
}

/// Returns the Twitter-like bearer token exchange URL.
///
/// Overridable through `TWITTER_TOKEN_URL`. The application bearer token is
/// obtained here once per process via the key:secret Basic exchange.
pub fn twitter_token_url() -> String {
    env_opt("TWITTER_TOKEN_URL").unwrap_or_else(|| "https://api.twitter.com/oauth2/token".to_string())
}

/// Returns the Flickr-like REST API base URL.
///
/// Overridable through `FLICKR_API_URL`.
pub fn flickr_api_url() -> String {
    env_opt("FLICKR_API_URL").unwrap_or_else(|| "https://api.flickr.com/services/rest".to_string())
}

/// Returns the Instagram-like API base URL.
///
/// Overridable through `INSTAGRAM_API_URL`.
pub fn instagram_api_url() -> String {
    env_opt("INSTAGRAM_API_URL").unwrap_or_else(|| "https://api.instagram.com/v1".to_string())
}

/// Returns the spreadsheet values API base URL.
///
/// Overridable through `SHEETS_API_URL`, e.g. for integration testing
/// against a local stand-in service.
pub fn sheets_api_url() -> String {
    env_opt("SHEETS_API_URL")
        .unwrap_or_else(|| "https://sheets.googleapis.com/v4/spreadsheets".to_string())
}
