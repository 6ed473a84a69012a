//! HTML extraction for listing and species pages.
//!
//! All selectors come from [`SelectorConfig`] so markup changes on the
//! source site can be followed without a rebuild.

use crate::config::toml_config::SelectorConfig;
use crate::domain::model::{BirdImage, BirdRecord, PopulationEntry, Rarity};
use crate::utils::error::{EtlError, Result};
use crate::utils::text::normalize_ws;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub struct Extractor {
    listing_container: Selector,
    listing_item: Selector,
    anchor: Selector,
    name: Selector,
    description: Option<Selector>,
    description_meta: Option<Selector>,
    gallery_image: Selector,
    stats_item: Option<Selector>,
    population: Option<Selector>,
    term: Selector,
    definition: Selector,
    scientific_name: (String, String),
    family: (String, String),
}

impl Extractor {
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            listing_container: compile("selectors.listing_container", &config.listing_container)?,
            listing_item: compile("selectors.listing_item", &config.listing_item)?,
            anchor: compile("anchor", "a[href]")?,
            name: compile("selectors.name", &config.name)?,
            description: compile_optional("selectors.description", &config.description)?,
            description_meta: compile_optional(
                "selectors.description_meta",
                &config.description_meta,
            )?,
            gallery_image: compile("selectors.gallery_image", &config.gallery_image)?,
            stats_item: compile_optional("selectors.stats_item", &config.stats_item)?,
            population: compile_optional("selectors.population", &config.population)?,
            term: compile("dt", "dt")?,
            definition: compile("dd", "dd")?,
            scientific_name: (
                config.scientific_name_keyword.clone(),
                config.scientific_name_tag.to_ascii_lowercase(),
            ),
            family: (
                config.family_keyword.clone(),
                config.family_tag.to_ascii_lowercase(),
            ),
        })
    }

    /// Absolute species page URLs found in a listing page, in page order and
    /// without duplicates. Fails when the listing container is absent.
    pub fn listing_links(&self, html: &str, page_url: &Url) -> Result<Vec<Url>> {
        let document = Html::parse_document(html);

        let container = document
            .select(&self.listing_container)
            .next()
            .ok_or_else(|| EtlError::parse(page_url.as_str(), "listing container not found"))?;

        let mut links: Vec<Url> = Vec::new();
        for item in container.select(&self.listing_item) {
            let href = item.value().attr("href").or_else(|| {
                item.select(&self.anchor)
                    .next()
                    .and_then(|a| a.value().attr("href"))
            });

            let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) else {
                tracing::warn!("Listing item without a link in {}", page_url);
                continue;
            };

            match page_url.join(href) {
                Ok(link) if !links.contains(&link) => links.push(link),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping bad link '{}' in {}: {}", href, page_url, e),
            }
        }

        Ok(links)
    }

    /// Extract one species. The name and at least one gallery image are
    /// required; other fields are logged and left empty when missing.
    pub fn bird(&self, html: &str, page_url: &Url) -> Result<BirdRecord> {
        let document = Html::parse_document(html);
        let url = page_url.as_str();

        let name = document
            .select(&self.name)
            .next()
            .map(|el| element_text(&el))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EtlError::parse(url, "missing species name"))?;

        let images = self.images(&document, page_url);
        let image_url = images
            .first()
            .map(|img| img.url.clone())
            .ok_or_else(|| EtlError::parse(url, format!("no gallery image for {}", name)))?;

        let description = self.description(&document).unwrap_or_else(|| {
            tracing::warn!("Missing description data in {}", url);
            String::new()
        });

        let stats: Vec<ElementRef> = match &self.stats_item {
            Some(sel) => document.select(sel).collect(),
            None => Vec::new(),
        };
        let scientific_name = search_info(&stats, &self.scientific_name.0, &self.scientific_name.1);
        if scientific_name.is_none() {
            tracing::warn!("Missing {} data in {}", self.scientific_name.0, url);
        }
        let family = search_info(&stats, &self.family.0, &self.family.1);
        if family.is_none() {
            tracing::warn!("Missing {} data in {}", self.family.0, url);
        }

        let population = self.population(&document, url);

        Ok(BirdRecord {
            name,
            description,
            image_url,
            scientific_name,
            family,
            population,
            images,
            source_url: url.to_string(),
            abundance: 0,
            rarity: Rarity::default(),
        })
    }

    fn description(&self, document: &Html) -> Option<String> {
        let from_body = self.description.as_ref().and_then(|sel| {
            document
                .select(sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty())
        });

        from_body.or_else(|| {
            let sel = self.description_meta.as_ref()?;
            document
                .select(sel)
                .filter_map(|el| el.value().attr("content"))
                .map(normalize_ws)
                .find(|t| !t.is_empty())
        })
    }

    fn images(&self, document: &Html, page_url: &Url) -> Vec<BirdImage> {
        let mut images: Vec<BirdImage> = Vec::new();
        for img in document.select(&self.gallery_image) {
            let el = img.value();
            let Some(src) = el
                .attr("data-src")
                .or_else(|| el.attr("src"))
                .map(str::trim)
                .filter(|s| !s.is_empty())
            else {
                continue;
            };

            let Some(url) = clean_image_url(page_url, src) else {
                tracing::warn!("Skipping bad image URL '{}' in {}", src, page_url);
                continue;
            };

            if images.iter().any(|i| i.url == url) {
                continue;
            }
            images.push(BirdImage {
                caption: el.attr("alt").map(normalize_ws).unwrap_or_default(),
                url,
                filename: None,
            });
        }
        images
    }

    fn population(&self, document: &Html, url: &str) -> Vec<PopulationEntry> {
        let Some(sel) = &self.population else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        for dl in document.select(sel) {
            let terms: Vec<String> = dl.select(&self.term).map(|e| element_text(&e)).collect();
            let definitions: Vec<String> = dl
                .select(&self.definition)
                .map(|e| element_text(&e))
                .collect();

            if terms.len() != definitions.len() {
                tracing::warn!(
                    "Population table in {} has {} terms but {} definitions, ignoring it",
                    url,
                    terms.len(),
                    definitions.len()
                );
                continue;
            }

            for (term, value) in terms.into_iter().zip(definitions) {
                let kind = term.trim_end_matches(':').trim_end().to_string();
                entries.push(PopulationEntry { kind, value });
            }
        }

        if entries.is_empty() {
            tracing::warn!("Missing population data in {}", url);
        }
        entries
    }
}

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::InvalidConfigValueError {
        field: field.to_string(),
        value: css.to_string(),
        reason: format!("Invalid CSS selector: {}", e),
    })
}

fn compile_optional(field: &str, css: &str) -> Result<Option<Selector>> {
    if css.trim().is_empty() {
        return Ok(None);
    }
    compile(field, css).map(Some)
}

fn element_text(el: &ElementRef) -> String {
    normalize_ws(&el.text().collect::<String>())
}

/// Text of the first `tag` element following a text node that mentions
/// `keyword`, e.g. `Scientific name: <strong>Erithacus rubecula</strong>`.
fn search_info(items: &[ElementRef], keyword: &str, tag: &str) -> Option<String> {
    for item in items {
        let mut seen_keyword = false;
        for node in item.descendants() {
            if !seen_keyword {
                if let Some(text) = node.value().as_text() {
                    seen_keyword = text.contains(keyword);
                }
            } else if let Some(el) = ElementRef::wrap(node) {
                if el.value().name() == tag {
                    let value = element_text(&el);
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
        }
    }
    None
}

/// Resolve `src` against the page and drop query and fragment, which on the
/// source site only carry resize parameters.
fn clean_image_url(page_url: &Url, src: &str) -> Option<String> {
    let mut url = page_url.join(src).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}
