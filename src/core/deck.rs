//! Rendering of the flashcard outputs and the image file naming they refer to.

use crate::domain::model::{BirdImage, BirdRecord, DeckRow, ImageDownload, PopulationEntry};
use crate::utils::error::{EtlError, Result};
use crate::utils::text::slugify;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use url::Url;

const DEFAULT_EXTENSION: &str = "jpg";

const CSV_COLUMNS: [&str; 3] = ["name", "description", "image_filename"];

const ANKI_COLUMNS: [&str; 8] = [
    "Name",
    "Scientific name",
    "Family",
    "Images",
    "Population",
    "URL",
    "Abundance",
    "Rarity",
];

/// Lowercased file extension of the last path segment of `url`, or `jpg`.
pub fn image_extension(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());

    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Give every record's primary image the file name `<slug>.<ext>`, and with
/// `all_images` the rest of its gallery `<slug>-<n>.<ext>`. Returns the
/// downloads in deck order; later entries overwrite earlier ones that share a
/// file name.
pub fn assign_filenames(records: &mut [BirdRecord], all_images: bool) -> Vec<ImageDownload> {
    let mut downloads = Vec::new();

    for record in records.iter_mut() {
        let slug = slugify(&record.name);

        if record.images.first().map(|i| i.url.as_str()) != Some(record.image_url.as_str()) {
            record.images.insert(
                0,
                BirdImage {
                    caption: String::new(),
                    url: record.image_url.clone(),
                    filename: None,
                },
            );
        }

        for (index, image) in record.images.iter_mut().enumerate() {
            if index > 0 && !all_images {
                image.filename = None;
                continue;
            }
            let ext = image_extension(&image.url);
            let filename = if index == 0 {
                format!("{}.{}", slug, ext)
            } else {
                format!("{}-{}.{}", slug, index + 1, ext)
            };
            image.filename = Some(filename.clone());
            downloads.push(ImageDownload {
                url: image.url.clone(),
                filename,
            });
        }
    }

    downloads
}

pub fn deck_rows(records: &[BirdRecord]) -> Vec<DeckRow> {
    records
        .iter()
        .map(|r| DeckRow {
            name: r.name.clone(),
            description: r.description.clone(),
            image_filename: r
                .images
                .first()
                .and_then(|i| i.filename.clone())
                .unwrap_or_else(|| {
                    format!("{}.{}", slugify(&r.name), image_extension(&r.image_url))
                }),
        })
        .collect()
}

/// `name,description,image_filename` with a header row and standard quoting.
pub fn render_csv(rows: &[DeckRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    // header even for an empty deck
    writer.write_record(CSV_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<DeckRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Anki text import: directive header lines, then `;`-separated notes with
/// HTML in the image and population fields.
pub fn render_anki(records: &[BirdRecord], deck_name: &str, note_type: &str) -> Result<Vec<u8>> {
    let mut out = format!(
        "#separator:Semicolon\n#html:true\n#columns:{}\n#notetype:{}\n#deck:{}\n",
        ANKI_COLUMNS.join(";"),
        note_type,
        deck_name
    )
    .into_bytes();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(Vec::new());

    for r in records {
        writer.write_record([
            r.name.clone(),
            r.scientific_name.clone().unwrap_or_default(),
            r.family.clone().unwrap_or_default(),
            card_images(&r.images),
            card_population(&r.population),
            r.source_url.clone(),
            r.abundance.to_string(),
            r.rarity.to_string(),
        ])?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn card_images(images: &[BirdImage]) -> String {
    images
        .iter()
        .filter_map(|image| {
            image.filename.as_ref().map(|filename| {
                format!(
                    "<figure><img src='{}'><figcaption>{}</figcaption></figure>",
                    filename, image.caption
                )
            })
        })
        .collect::<Vec<_>>()
        .join("<hr>")
}

fn card_population(population: &[PopulationEntry]) -> String {
    population
        .iter()
        .map(|p| {
            format!(
                "<div class='poptype'>{}</div> <div class='popvalue'>{}</div>",
                p.kind, p.value
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Serialize)]
struct JsonExport<'a> {
    generated_at: DateTime<Utc>,
    count: usize,
    birds: &'a [BirdRecord],
}

pub fn render_json(records: &[BirdRecord]) -> Result<Vec<u8>> {
    let export = JsonExport {
        generated_at: Utc::now(),
        count: records.len(),
        birds: records,
    };
    Ok(serde_json::to_vec_pretty(&export)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Rarity;

    fn robin() -> BirdRecord {
        let mut record = BirdRecord::new(
            "Robin",
            "Red breast, \"cheery\" song",
            "https://example.com/media/robin.JPEG",
        );
        record.images[0].caption = "adult".to_string();
        record.images.push(BirdImage {
            caption: "juvenile".to_string(),
            url: "https://example.com/media/robin-juv.png".to_string(),
            filename: None,
        });
        record.scientific_name = Some("Erithacus rubecula".to_string());
        record.family = Some("Chats and thrushes".to_string());
        record.population = vec![PopulationEntry {
            kind: "UK breeding".to_string(),
            value: "7,350,000 territories".to_string(),
        }];
        record.source_url = "https://example.com/birds/robin/".to_string();
        record.abundance = 14_700_000;
        record.rarity = Rarity::Common;
        record
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://example.com/a/robin.JPEG"), "jpeg");
        assert_eq!(image_extension("https://example.com/a/robin.png?w=10"), "png");
        assert_eq!(image_extension("https://example.com/a/robin"), "jpg");
        assert_eq!(image_extension("https://example.com/a.b/robin"), "jpg");
        assert_eq!(image_extension("https://example.com/a/.hidden"), "jpg");
        assert_eq!(image_extension("/relative/wren.gif"), "gif");
    }

    #[test]
    fn test_assign_filenames_primary_only() {
        let mut records = vec![robin()];
        let downloads = assign_filenames(&mut records, false);

        assert_eq!(
            downloads,
            vec![ImageDownload {
                url: "https://example.com/media/robin.JPEG".to_string(),
                filename: "robin.jpeg".to_string(),
            }]
        );
        assert_eq!(records[0].images[1].filename, None);
    }

    #[test]
    fn test_assign_filenames_all_images() {
        let mut records = vec![robin()];
        let downloads = assign_filenames(&mut records, true);

        let names: Vec<&str> = downloads.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["robin.jpeg", "robin-2.png"]);
    }

    #[test]
    fn test_same_slug_yields_same_filename() {
        let mut records = vec![
            BirdRecord::new("Robin", "first", "https://example.com/1.jpg"),
            BirdRecord::new("Robin!", "second", "https://example.com/2.jpg"),
        ];
        let downloads = assign_filenames(&mut records, false);

        assert_eq!(downloads.len(), 2);
        assert_eq!(downloads[0].filename, "robin.jpg");
        assert_eq!(downloads[1].filename, "robin.jpg");
        assert_eq!(downloads[1].url, "https://example.com/2.jpg");
    }

    #[test]
    fn test_csv_quotes_embedded_commas_and_quotes() {
        let mut records = vec![robin()];
        assign_filenames(&mut records, false);
        let csv = String::from_utf8(render_csv(&deck_rows(&records)).unwrap()).unwrap();

        assert_eq!(
            csv,
            "name,description,image_filename\nRobin,\"Red breast, \"\"cheery\"\" song\",robin.jpeg\n"
        );
    }

    #[test]
    fn test_empty_csv_has_header_only() {
        let csv = render_csv(&[]).unwrap();
        assert_eq!(csv, b"name,description,image_filename\n");
    }

    #[test]
    fn test_anki_output() {
        let mut records = vec![robin()];
        assign_filenames(&mut records, true);
        let anki =
            String::from_utf8(render_anki(&records, "UK Birds", "Bird species").unwrap()).unwrap();
        let lines: Vec<&str> = anki.lines().collect();

        assert_eq!(lines[0], "#separator:Semicolon");
        assert_eq!(lines[1], "#html:true");
        assert_eq!(
            lines[2],
            "#columns:Name;Scientific name;Family;Images;Population;URL;Abundance;Rarity"
        );
        assert_eq!(lines[3], "#notetype:Bird species");
        assert_eq!(lines[4], "#deck:UK Birds");
        assert_eq!(lines.len(), 6);
        assert!(lines[5].starts_with("Robin;Erithacus rubecula;Chats and thrushes;"));
        assert!(lines[5].contains("<img src='robin.jpeg'><figcaption>adult</figcaption>"));
        assert!(lines[5].contains("<hr><figure><img src='robin-2.png'>"));
        assert!(lines[5].ends_with(";https://example.com/birds/robin/;14700000;common"));
    }

    #[test]
    fn test_json_export() {
        let json = render_json(&[robin()]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["count"], 1);
        assert_eq!(value["birds"][0]["name"], "Robin");
        assert_eq!(value["birds"][0]["rarity"], "common");
        assert!(value["generated_at"].is_string());
    }
}
