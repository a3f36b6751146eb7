use std::path::Path;

use tabled::Table;

use crate::{
    config, error, info,
    management::TokenManager,
    providers::{FlickrProvider, InstagramProvider, Provider, TwitterProvider},
    store::{CsvStore, HttpSheetsTransport, SheetStore, TabularStore},
    success, sync,
};

pub struct HarvestOptions {
    pub tags: Vec<String>,
    pub twitter_key: Option<String>,
    pub twitter_secret: Option<String>,
    pub flickr_key: Option<String>,
    pub instagram_key: Option<String>,
    pub google_credentials: Option<String>,
    pub google_spreadsheet_id: Option<String>,
    pub auto_approve: bool,
    pub batch_rows: usize,
    pub debug: bool,
}

pub async fn harvest(opts: HarvestOptions) {
    let twitter_key = opts.twitter_key.or_else(config::twitter_key);
    let twitter_secret = opts.twitter_secret.or_else(config::twitter_secret);
    let flickr_key = opts.flickr_key.or_else(config::flickr_key);
    let instagram_key = opts.instagram_key.or_else(config::instagram_key);
    let google_credentials = opts.google_credentials.or_else(config::google_credentials);
    let google_spreadsheet_id = opts
        .google_spreadsheet_id
        .or_else(config::google_spreadsheet_id);

    if opts.tags.is_empty() {
        error!("you must specify at least one tag");
    }
    if twitter_key.is_some() != twitter_secret.is_some() {
        error!("you must specify both --twitter-key and --twitter-secret");
    }
    if twitter_key.is_none() && flickr_key.is_none() && instagram_key.is_none() {
        error!("you must specify at least one provider API key");
    }
    if google_credentials.is_some() != google_spreadsheet_id.is_some() {
        error!(
            "you must specify both --google-credentials and --google-spreadsheet-id to use a spreadsheet"
        );
    }

    let mut providers: Vec<Box<dyn Provider>> = Vec::new();
    if let (Some(key), Some(secret)) = (twitter_key, twitter_secret) {
        match TwitterProvider::new(key, secret) {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(e) => error!("Cannot set up the Twitter client: {}", e),
        }
    }
    if let Some(key) = flickr_key {
        match FlickrProvider::new(key) {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(e) => error!("Cannot set up the Flickr client: {}", e),
        }
    }
    if let Some(key) = instagram_key {
        match InstagramProvider::new(key) {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(e) => error!("Cannot set up the Instagram client: {}", e),
        }
    }

    if opts.debug {
        info!("Debug mode: reads happen, writes are skipped.");
    }

    match (google_credentials, google_spreadsheet_id) {
        (Some(credentials_path), Some(spreadsheet_id)) => {
            let tokens = match TokenManager::from_key_file(&credentials_path).await {
                Ok(manager) => manager,
                Err(e) => {
                    error!(
                        "Cannot load spreadsheet credentials from {}: {}",
                        credentials_path, e
                    );
                }
            };
            let transport = match HttpSheetsTransport::new(spreadsheet_id) {
                Ok(transport) => transport,
                Err(e) => error!("Cannot set up the spreadsheet client: {}", e),
            };

            let mut store = SheetStore::new(
                Box::new(transport),
                Box::new(tokens),
                opts.auto_approve,
                opts.debug,
                opts.batch_rows,
            );
            run_sync(&providers, &opts.tags, &mut store).await;
        }
        _ => {
            let mut store = CsvStore::new(Path::new("."), opts.auto_approve, opts.debug);
            if !opts.debug {
                info!("Writing to {}", store.path().display());
            }
            run_sync(&providers, &opts.tags, &mut store).await;
        }
    }
}

async fn run_sync(providers: &[Box<dyn Provider>], tags: &[String], store: &mut dyn TabularStore) {
    match sync::run(providers, tags, store).await {
        Ok(summary) => {
            let rows = summary.table_rows();
            if !rows.is_empty() {
                println!("{}", Table::new(rows));
            }
            success!("Sync finished, {} records harvested.", summary.total_harvested());
        }
        Err(e) => error!("Sync aborted: {}", e),
    }
}
