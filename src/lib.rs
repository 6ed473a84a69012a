pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::toml_config::{DeckConfig, DeckFormat};

pub use core::{etl::EtlEngine, pipeline::BirdPipeline};
pub use domain::model::{BirdRecord, DeckRow, LoadSummary};
pub use utils::error::{EtlError, Result};
