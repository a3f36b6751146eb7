use clap::{
    CommandFactory, Parser,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use tagsync::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// Tags to harvest recent photos for
    #[clap(value_name = "TAG", required_unless_present = "completions")]
    tags: Vec<String>,

    /// Twitter API key
    #[clap(long)]
    twitter_key: Option<String>,

    /// Twitter API secret
    #[clap(long)]
    twitter_secret: Option<String>,

    /// Flickr API key
    #[clap(long)]
    flickr_key: Option<String>,

    /// Instagram client id
    #[clap(long)]
    instagram_key: Option<String>,

    /// Path to the spreadsheet JSON key file
    #[clap(long)]
    google_credentials: Option<String>,

    /// Write to this spreadsheet instead of a local CSV file
    #[clap(long, short = 'g')]
    google_spreadsheet_id: Option<String>,

    /// Pre-approve new records by filling usable_tag with the searched tag
    #[clap(long)]
    auto_approve: bool,

    /// Group spreadsheet appends into batches of this size
    #[clap(long, default_value_t = 1)]
    batch_rows: usize,

    /// Print and read but never write
    #[clap(long, short = 'd')]
    debug: bool,

    /// Emit shell completions and exit
    #[clap(long)]
    completions: Option<Shell>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command_for_update();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    cli::harvest(cli::HarvestOptions {
        tags: cli.tags,
        twitter_key: cli.twitter_key,
        twitter_secret: cli.twitter_secret,
        flickr_key: cli.flickr_key,
        instagram_key: cli.instagram_key,
        google_credentials: cli.google_credentials,
        google_spreadsheet_id: cli.google_spreadsheet_id,
        auto_approve: cli.auto_approve,
        batch_rows: cli.batch_rows,
        debug: cli.debug,
    })
    .await
}
