pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use toml_config::{DeckConfig, DeckFormat};

/// Command-line flags. Every flag is optional; a flag that is given
/// overrides the config file, which overrides the built-in defaults.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "bird-deck")]
#[command(about = "Scrape bird species into a flashcard CSV and image folder")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    /// Listing page path; `{page}` is replaced by the page number
    #[arg(long)]
    pub listing_path: Option<String>,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(short, long)]
    pub output_dir: Option<String>,

    #[arg(long)]
    pub csv_filename: Option<String>,

    #[arg(long)]
    pub images_dir: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<DeckFormat>,

    /// Download every gallery image, not only the first
    #[arg(long)]
    pub all_images: bool,

    /// Also dump the enriched records as JSON to this file
    #[arg(long)]
    pub json: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn into_deck_config(self) -> Result<DeckConfig> {
        let mut config = match &self.config {
            Some(path) => DeckConfig::from_file(path)?,
            None => DeckConfig::default(),
        };

        if let Some(v) = self.base_url {
            config.site.base_url = v;
        }
        if let Some(v) = self.listing_path {
            config.site.listing_path = v;
        }
        if let Some(v) = self.max_pages {
            config.site.max_pages = v;
        }
        if let Some(v) = self.timeout_secs {
            config.site.timeout_seconds = v;
        }
        if let Some(v) = self.output_dir {
            config.output.output_dir = v;
        }
        if let Some(v) = self.csv_filename {
            config.output.csv_filename = v;
        }
        if let Some(v) = self.images_dir {
            config.output.images_dir = v;
        }
        if let Some(v) = self.format {
            config.output.format = v;
        }
        if self.all_images {
            config.output.all_images = true;
        }
        if let Some(v) = self.json {
            config.output.json_filename = Some(v);
        }

        Ok(config)
    }
}
