use crate::config::toml_config::{DeckConfig, DeckFormat};
use crate::core::deck;
use crate::core::enrich;
use crate::core::extractor::Extractor;
use crate::core::fetcher::HttpFetcher;
use crate::domain::model::{BirdRecord, LoadSummary, TransformResult};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::Result;
use std::collections::HashMap;
use url::Url;

/// Scrapes the configured site into a flashcard deck. Requests are issued
/// one at a time in page order.
pub struct BirdPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: DeckConfig,
    pub(crate) fetcher: HttpFetcher,
    pub(crate) extractor: Extractor,
}

impl<S: Storage> BirdPipeline<S> {
    pub fn new(storage: S, config: DeckConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.timeout(), &config.site.user_agent)?;
        let extractor = Extractor::new(&config.selectors)?;
        Ok(Self {
            storage,
            config,
            fetcher,
            extractor,
        })
    }

    /// Walk listing pages until one has no species links.
    async fn species_links(&self) -> Result<Vec<Url>> {
        let mut links: Vec<Url> = Vec::new();
        let max_pages = self.config.site.max_pages;

        for page in 1..=max_pages {
            let page_url = self.config.listing_url(page)?;
            let html = self.fetcher.fetch_text(page_url.as_str()).await?;

            let page_links = match self.extractor.listing_links(&html, &page_url) {
                Ok(page_links) => page_links,
                Err(e) if page > 1 && e.is_recoverable() => {
                    tracing::warn!("Ending listing crawl at page {}: {}", page, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            if page_links.is_empty() {
                tracing::debug!("Listing page {} is empty, crawl complete", page);
                break;
            }

            let before = links.len();
            for link in page_links {
                if !links.contains(&link) {
                    links.push(link);
                }
            }
            tracing::debug!("Listing page {}: {} new links", page, links.len() - before);

            if links.len() == before {
                tracing::warn!("Listing page {} repeats earlier pages, stopping", page);
                break;
            }
            if page == max_pages {
                tracing::warn!(
                    "Stopped at site.max_pages ({}); the listing may continue",
                    max_pages
                );
            }
        }

        Ok(links)
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for BirdPipeline<S> {
    async fn extract(&self) -> Result<Vec<BirdRecord>> {
        tracing::info!("🔍 Searching for birds at {}", self.config.site.base_url);
        let links = self.species_links().await?;
        tracing::info!("Found {} birds", links.len());

        let mut records: Vec<BirdRecord> = Vec::with_capacity(links.len());
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut skipped = 0usize;

        for (index, link) in links.iter().enumerate() {
            let html = self.fetcher.fetch_text(link.as_str()).await?;

            let record = match self.extractor.bird(&html, link) {
                Ok(record) => record,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Skipping record: {}", e);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            tracing::debug!("{}/{}: {}", index + 1, links.len(), record.name);
            match by_name.get(&record.name) {
                Some(&existing) => {
                    tracing::warn!(
                        "Duplicate species '{}' at {}, replacing {}",
                        record.name,
                        record.source_url,
                        records[existing].source_url
                    );
                    records[existing] = record;
                }
                None => {
                    by_name.insert(record.name.clone(), records.len());
                    records.push(record);
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} malformed species pages", skipped);
        }
        tracing::info!("📊 Extracted {} records", records.len());
        Ok(records)
    }

    async fn transform(&self, mut records: Vec<BirdRecord>) -> Result<TransformResult> {
        tracing::info!("🔧 Enriching {} records", records.len());

        enrich::enrich(&mut records, &self.config.enrichment);
        let downloads = deck::assign_filenames(&mut records, self.config.output.all_images);

        let deck_output = match self.config.output.format {
            DeckFormat::Csv => deck::render_csv(&deck::deck_rows(&records))?,
            DeckFormat::Anki => deck::render_anki(
                &records,
                &self.config.output.deck_name,
                &self.config.output.note_type,
            )?,
        };

        let json_output = match &self.config.output.json_filename {
            Some(_) => Some(deck::render_json(&records)?),
            None => None,
        };

        Ok(TransformResult {
            records,
            deck_output,
            downloads,
            json_output,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadSummary> {
        let deck_file = self.config.deck_filename();
        self.storage.write_file(deck_file, &result.deck_output).await?;
        let deck_path = self.storage.location(deck_file);
        tracing::info!("💾 Wrote {} rows to {}", result.records.len(), deck_path);

        let total = result.downloads.len();
        tracing::info!("Downloading {} images to {}", total, self.config.output.images_dir);
        for (index, download) in result.downloads.iter().enumerate() {
            let bytes = self.fetcher.fetch_bytes(&download.url).await?;
            let path = self.config.image_path(&download.filename);
            self.storage.write_file(&path, &bytes).await?;
            tracing::debug!("{}/{}: {}", index + 1, total, download.filename);
        }

        let json_path = match (&self.config.output.json_filename, &result.json_output) {
            (Some(name), Some(json)) => {
                self.storage.write_file(name, json).await?;
                let location = self.storage.location(name);
                tracing::info!("Saved data to {}", location);
                Some(location)
            }
            _ => None,
        };

        Ok(LoadSummary {
            deck_path,
            rows_written: result.records.len(),
            images_written: total,
            json_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use httpmock::prelude::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn location(&self, path: &str) -> String {
            format!("mock://{}", path)
        }
    }

    fn species_page(name: &str, image: &str) -> String {
        format!(
            r#"<div class="species-hero"><h1 class="species-hero__page-title">{name}</h1>
<p class="species-hero__description">About the {name}.</p></div>
<div class="species-gallery"><img alt="{name}" data-src="{image}"></div>"#
        )
    }

    fn config_for(server: &MockServer) -> DeckConfig {
        let mut config = DeckConfig::default();
        config.site.base_url = server.base_url();
        config.site.listing_path = "/a-z/?Page={page}".to_string();
        config.site.max_pages = 5;
        config.enrichment.overrides.clear();
        config
    }

    #[tokio::test]
    async fn test_extract_walks_pages_and_replaces_duplicates() {
        let server = MockServer::start();
        let page1 = server.mock(|when, then| {
            when.method(GET).path("/a-z/").query_param("Page", "1");
            then.status(200).body(
                r#"<div class="bird-browser">
<a class="BirdSpecies" href="/birds/robin/">Robin</a>
<a class="BirdSpecies" href="/birds/robin-again/">Robin</a></div>"#,
            );
        });
        let page2 = server.mock(|when, then| {
            when.method(GET).path("/a-z/").query_param("Page", "2");
            then.status(200).body(
                r#"<div class="bird-browser"><a class="BirdSpecies" href="/birds/wren/">Wren</a></div>"#,
            );
        });
        let page3 = server.mock(|when, then| {
            when.method(GET).path("/a-z/").query_param("Page", "3");
            then.status(200).body(r#"<div class="bird-browser"></div>"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/birds/robin/");
            then.status(200).body(species_page("Robin", "/img/robin-1.jpg"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/birds/robin-again/");
            then.status(200).body(species_page("Robin", "/img/robin-2.jpg"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/birds/wren/");
            then.status(200).body(species_page("Wren", "/img/wren.jpg"));
        });

        let pipeline = BirdPipeline::new(MockStorage::new(), config_for(&server)).unwrap();
        let records = pipeline.extract().await.unwrap();

        page1.assert();
        page2.assert();
        page3.assert();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Robin", "Wren"]);
        assert!(records[0].image_url.ends_with("/img/robin-2.jpg"));
    }

    #[tokio::test]
    async fn test_missing_listing_container_on_first_page_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a-z/");
            then.status(200).body("<html><body>Redesigned!</body></html>");
        });

        let pipeline = BirdPipeline::new(MockStorage::new(), config_for(&server)).unwrap();
        let err = pipeline.extract().await.unwrap_err();

        assert!(matches!(err, EtlError::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_detail_page_http_error_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a-z/").query_param("Page", "1");
            then.status(200).body(
                r#"<div class="bird-browser"><a class="BirdSpecies" href="/birds/gone/">Gone</a></div>"#,
            );
        });
        server.mock(|when, then| {
            when.method(GET).path("/a-z/").query_param("Page", "2");
            then.status(200).body(r#"<div class="bird-browser"></div>"#);
        });
        let detail = server.mock(|when, then| {
            when.method(GET).path("/birds/gone/");
            then.status(500);
        });

        let pipeline = BirdPipeline::new(MockStorage::new(), config_for(&server)).unwrap();
        let err = pipeline.extract().await.unwrap_err();

        detail.assert();
        match &err {
            EtlError::HttpStatusError { url, status } => {
                assert_eq!(*status, 500);
                assert!(url.ends_with("/birds/gone/"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_load_writes_deck_images_and_json() {
        let server = MockServer::start();
        let image_mock = server.mock(|when, then| {
            when.method(GET).path("/img/wren.png");
            then.status(200).body("png-bytes");
        });

        let mut config = config_for(&server);
        config.output.json_filename = Some("bird-data.json".to_string());
        let storage = MockStorage::new();
        let pipeline = BirdPipeline::new(storage.clone(), config).unwrap();

        let record = BirdRecord::new("Wren", "Tiny, loud", server.url("/img/wren.png"));
        let result = pipeline.transform(vec![record]).await.unwrap();
        let summary = pipeline.load(result).await.unwrap();

        image_mock.assert();
        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.images_written, 1);
        assert_eq!(summary.deck_path, "mock://output.csv");
        assert_eq!(summary.json_path.as_deref(), Some("mock://bird-data.json"));

        let csv = storage.get_file("output.csv").await.unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "name,description,image_filename\nWren,\"Tiny, loud\",wren.png\n"
        );
        assert_eq!(
            storage.get_file("images/wren.png").await.unwrap(),
            b"png-bytes".to_vec()
        );
        assert!(storage.get_file("bird-data.json").await.is_some());
    }
}
