use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Complete run configuration. Every section has defaults, so an empty TOML
/// file (or none at all) scrapes the RSPB bird A-Z into `./output.csv`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
    pub enrichment: EnrichmentConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Path of a listing page relative to `base_url`; `{page}` is replaced
    /// by the 1-based page number.
    pub listing_path: String,
    pub max_pages: usize,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.rspb.org.uk".to_string(),
            listing_path: "/birds-and-wildlife/wildlife-guides/bird-a-z/?Page={page}".to_string(),
            max_pages: 100,
            timeout_seconds: 30,
            user_agent: concat!("bird-deck/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// CSS selectors tied to the source site's markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub listing_container: String,
    pub listing_item: String,
    pub name: String,
    pub description: String,
    /// Fallback read from the `content` attribute.
    pub description_meta: String,
    pub gallery_image: String,
    pub stats_item: String,
    pub population: String,
    pub scientific_name_keyword: String,
    pub scientific_name_tag: String,
    pub family_keyword: String,
    pub family_tag: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_container: ".bird-browser".to_string(),
            listing_item: ".BirdSpecies".to_string(),
            name: ".species-hero .species-hero__page-title".to_string(),
            description: ".species-hero__description".to_string(),
            description_meta: "meta[name=\"description\"]".to_string(),
            gallery_image: ".species-gallery img".to_string(),
            stats_item: ".species-hero__stats .species-hero__stats-item".to_string(),
            population: ".species-measurements-population__population dl".to_string(),
            scientific_name_keyword: "Scientific name".to_string(),
            scientific_name_tag: "strong".to_string(),
            family_keyword: "family".to_string(),
            family_tag: "a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub uncommon_threshold: u64,
    pub common_threshold: u64,
    pub overrides: Vec<SpeciesOverride>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            uncommon_threshold: 1_000,
            common_threshold: 100_000,
            overrides: default_overrides(),
        }
    }
}

/// Hand-curated values filling gaps in the scraped data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesOverride {
    pub species: String,
    pub scientific_name: Option<String>,
    pub family: Option<String>,
    pub description: Option<String>,
    pub population: Option<BTreeMap<String, String>>,
}

fn population_override(species: &str, kind: &str, value: &str) -> SpeciesOverride {
    SpeciesOverride {
        species: species.to_string(),
        population: Some(BTreeMap::from([(kind.to_string(), value.to_string())])),
        ..Default::default()
    }
}

fn family_override(species: &str, family: &str) -> SpeciesOverride {
    SpeciesOverride {
        species: species.to_string(),
        family: Some(family.to_string()),
        ..Default::default()
    }
}

fn default_overrides() -> Vec<SpeciesOverride> {
    vec![
        population_override("Great shearwater", "UK passage", "Very rare"),
        population_override("Grey phalarope", "UK passage", "200 birds"),
        population_override("Little auk", "UK wintering", "Very rare"),
        population_override("Long-tailed skua", "UK passage", "Very rare"),
        population_override("Pomarine skua", "UK passage", "Very rare"),
        family_override("Red-crested pochard", "Ducks, geese and swans"),
        family_override("Snow goose", "Ducks, geese and swans"),
        population_override("Sooty shearwater", "UK passage", "Very rare"),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DeckFormat {
    /// `name,description,image_filename`
    #[default]
    Csv,
    /// Anki text import with HTML fields.
    Anki,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: String,
    pub csv_filename: String,
    pub images_dir: String,
    pub format: DeckFormat,
    /// Download every gallery image, not just the first.
    pub all_images: bool,
    pub json_filename: Option<String>,
    pub deck_name: String,
    pub note_type: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            csv_filename: "output.csv".to_string(),
            images_dir: "images".to_string(),
            format: DeckFormat::Csv,
            all_images: false,
            json_filename: None,
            deck_name: "UK Birds".to_string(),
            note_type: "Bird species".to_string(),
        }
    }
}

impl DeckConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RSPB_BASE_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Absolute URL of listing page `page` (1-based).
    pub fn listing_url(&self, page: usize) -> Result<Url> {
        let path = self
            .site
            .listing_path
            .replace(PAGE_PLACEHOLDER, &page.to_string());
        self.base_url()?
            .join(&path)
            .map_err(|e| EtlError::InvalidConfigValueError {
                field: "site.listing_path".to_string(),
                value: path,
                reason: e.to_string(),
            })
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.site.base_url).map_err(|e| EtlError::InvalidConfigValueError {
            field: "site.base_url".to_string(),
            value: self.site.base_url.clone(),
            reason: e.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.site.timeout_seconds)
    }

    /// Location of the deck file relative to the output directory.
    pub fn deck_filename(&self) -> &str {
        &self.output.csv_filename
    }

    pub fn image_path(&self, filename: &str) -> String {
        format!("{}/{}", self.output.images_dir, filename)
    }
}

impl Validate for DeckConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("site.base_url", &self.site.base_url)?;
        validation::validate_contains_placeholder(
            "site.listing_path",
            &self.site.listing_path,
            PAGE_PLACEHOLDER,
        )?;
        self.listing_url(1)?;
        validation::validate_positive_number("site.max_pages", self.site.max_pages, 1)?;
        validation::validate_positive_number(
            "site.timeout_seconds",
            self.site.timeout_seconds as usize,
            1,
        )?;

        let selectors = [
            ("selectors.listing_container", &self.selectors.listing_container),
            ("selectors.listing_item", &self.selectors.listing_item),
            ("selectors.name", &self.selectors.name),
            ("selectors.gallery_image", &self.selectors.gallery_image),
        ];
        for (field, value) in selectors {
            validation::validate_non_empty_string(field, value)?;
        }

        if self.enrichment.uncommon_threshold > self.enrichment.common_threshold {
            return Err(EtlError::InvalidConfigValueError {
                field: "enrichment.uncommon_threshold".to_string(),
                value: self.enrichment.uncommon_threshold.to_string(),
                reason: format!(
                    "Must not exceed enrichment.common_threshold ({})",
                    self.enrichment.common_threshold
                ),
            });
        }
        for o in &self.enrichment.overrides {
            validation::validate_non_empty_string("enrichment.overrides.species", &o.species)?;
        }

        validation::validate_path("output.output_dir", &self.output.output_dir)?;
        validation::validate_file_name("output.csv_filename", &self.output.csv_filename)?;
        validation::validate_file_name("output.images_dir", &self.output.images_dir)?;
        if let Some(json) = &self.output.json_filename {
            validation::validate_file_name("output.json_filename", json)?;
            if json == &self.output.csv_filename {
                return Err(EtlError::InvalidConfigValueError {
                    field: "output.json_filename".to_string(),
                    value: json.clone(),
                    reason: "Must differ from output.csv_filename".to_string(),
                });
            }
        }

        Ok(())
    }
}
