use serde::{Deserialize, Serialize};
use std::fmt;

/// One species as extracted from a detail page and enriched in transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirdRecord {
    pub name: String,
    pub description: String,
    /// First gallery image, absolute URL without query string.
    pub image_url: String,
    pub scientific_name: Option<String>,
    pub family: Option<String>,
    pub population: Vec<PopulationEntry>,
    pub images: Vec<BirdImage>,
    pub source_url: String,
    #[serde(default)]
    pub abundance: u64,
    #[serde(default)]
    pub rarity: Rarity,
}

impl BirdRecord {
    /// A record carrying only the three core fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        let image_url = image_url.into();
        Self {
            name: name.into(),
            description: description.into(),
            images: vec![BirdImage {
                caption: String::new(),
                url: image_url.clone(),
                filename: None,
            }],
            image_url,
            scientific_name: None,
            family: None,
            population: Vec::new(),
            source_url: String::new(),
            abundance: 0,
            rarity: Rarity::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirdImage {
    pub caption: String,
    pub url: String,
    /// Set once transform has assigned a local file name.
    pub filename: Option<String>,
}

/// One term/definition pair of the population table, e.g.
/// `UK breeding` / `6,700,000 territories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationEntry {
    pub kind: String,
    pub value: String,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    #[default]
    Rare,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
        };
        f.write_str(s)
    }
}

/// A row of the flashcard CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckRow {
    pub name: String,
    pub description: String,
    pub image_filename: String,
}

/// An image the load step has to fetch and store under the images directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDownload {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub records: Vec<BirdRecord>,
    /// Rendered deck file (CSV or Anki text import).
    pub deck_output: Vec<u8>,
    pub downloads: Vec<ImageDownload>,
    pub json_output: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub deck_path: String,
    pub rows_written: usize,
    pub images_written: usize,
    pub json_path: Option<String>,
}
