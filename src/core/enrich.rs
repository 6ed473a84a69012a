//! Post-extraction enrichment: curated overrides, caption cleanup and the
//! abundance/rarity heuristics used to order the deck.
//!
//! Population figures on the source site come in many shapes ("6,700,000
//! territories", "110-200 pairs", "Hundreds", "c1,000 birds (plus 10 in
//! Ireland)"). [`abundance_from_text`] turns one of them into a rough bird
//! count; [`abundance`] combines the UK figures of a species into one score,
//! roughly the peak number of birds in the UK at any time of year.

use crate::config::toml_config::{EnrichmentConfig, SpeciesOverride};
use crate::domain::model::{BirdRecord, PopulationEntry, Rarity};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const UK_BREEDING: &str = "UK breeding";
const UK_WINTERING: &str = "UK wintering";
const UK_PASSAGE: &str = "UK passage";
const EUROPE: &str = "Europe";

/// Passage migrants don't stay long.
const PASSAGE_DIVISOR: u64 = 5;

pub fn enrich(records: &mut [BirdRecord], config: &EnrichmentConfig) {
    apply_overrides(records, &config.overrides);

    for record in records.iter_mut() {
        for image in &mut record.images {
            image.caption = caption_qualifier(&image.caption);
        }
        record.abundance = abundance(&record.name, &record.population);
        record.rarity = rarity(
            record.abundance,
            config.uncommon_threshold,
            config.common_threshold,
        );
    }

    sort_deck(records);

    let summary = data_summary(records);
    tracing::info!(
        "Population types ({}): {}",
        summary.population_types.len(),
        summary.population_types.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    tracing::info!("Population formats ({})", summary.population_formats.len());
    tracing::info!("Families ({})", summary.families.len());
}

/// Distinct shapes seen in the scraped data. A jump in formats or an
/// unfamiliar population type usually means the page markup moved.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DataSummary {
    pub population_types: BTreeSet<String>,
    /// Population values with every number replaced by `X`.
    pub population_formats: BTreeSet<String>,
    pub families: BTreeSet<String>,
}

pub fn data_summary(records: &[BirdRecord]) -> DataSummary {
    let number = &patterns().number;
    let mut summary = DataSummary::default();

    for record in records {
        for entry in &record.population {
            summary.population_types.insert(entry.kind.clone());
            summary
                .population_formats
                .insert(number.replace_all(&entry.value, "X").into_owned());
        }
        if let Some(family) = &record.family {
            summary.families.insert(family.clone());
        }
    }

    summary
}

pub fn apply_overrides(records: &mut [BirdRecord], overrides: &[SpeciesOverride]) {
    for o in overrides {
        let Some(record) = records.iter_mut().find(|r| r.name == o.species) else {
            tracing::warn!("Override for unknown species '{}' ignored", o.species);
            continue;
        };

        if let Some(value) = &o.scientific_name {
            replace_field(&o.species, "scientific name", &mut record.scientific_name, value);
        }
        if let Some(value) = &o.family {
            replace_field(&o.species, "family", &mut record.family, value);
        }
        if let Some(value) = &o.description {
            tracing::info!("Adding custom description for {}", o.species);
            if !record.description.is_empty() {
                tracing::warn!("Overwriting original description '{}'", record.description);
            }
            record.description = value.clone();
        }
        if let Some(population) = &o.population {
            tracing::info!("Adding custom population for {}", o.species);
            if !record.population.is_empty() {
                tracing::warn!(
                    "Overwriting original population data for {} ({} entries)",
                    o.species,
                    record.population.len()
                );
            }
            record.population = population
                .iter()
                .map(|(kind, value)| PopulationEntry {
                    kind: kind.clone(),
                    value: value.clone(),
                })
                .collect();
        }
    }
}

fn replace_field(species: &str, field: &str, slot: &mut Option<String>, value: &str) {
    tracing::info!("Adding custom value \"{}\" for {} of {}", value, field, species);
    if let Some(original) = slot.as_deref() {
        tracing::warn!("Overwriting original value '{}'", original);
    }
    *slot = Some(value.to_string());
}

/// Reduce an image alt text to its trailing qualifier:
/// `"Robin (juvenile)"` becomes `"juvenile"`, no brackets gives `""`.
pub fn caption_qualifier(alt: &str) -> String {
    let Some(caps) = patterns().caption.captures(alt.trim_end()) else {
        return String::new();
    };

    // from the first bracket, so nested qualifiers stay whole
    let qualifier = &caps[1];
    if qualifier == "feral pigeon" {
        return String::new();
    }
    qualifier.replace(" / ", "/").replace("Dark", "dark")
}

/// Combined abundance of a species from its population table.
pub fn abundance(species: &str, population: &[PopulationEntry]) -> u64 {
    let mut best: Option<u64> = None;

    for entry in population {
        let value = match entry.kind.as_str() {
            EUROPE => continue,
            UK_PASSAGE => abundance_from_text(&entry.value) / PASSAGE_DIVISOR,
            UK_BREEDING | UK_WINTERING => abundance_from_text(&entry.value),
            other => {
                tracing::warn!("Unknown population type '{}' for {}, ignoring it", other, species);
                continue;
            }
        };
        best = Some(best.map_or(value, |b| b.max(value)));
    }

    best.unwrap_or_else(|| {
        tracing::warn!("No UK population figures for {}, using abundance 0", species);
        0
    })
}

pub fn rarity(abundance: u64, uncommon_threshold: u64, common_threshold: u64) -> Rarity {
    if abundance >= common_threshold {
        Rarity::Common
    } else if abundance >= uncommon_threshold {
        Rarity::Uncommon
    } else {
        Rarity::Rare
    }
}

/// Stable sort by rarity band, then family, then scientific name.
pub fn sort_deck(records: &mut [BirdRecord]) {
    records.sort_by(|a, b| {
        a.rarity
            .cmp(&b.rarity)
            .then_with(|| cmp_optional(&a.family, &b.family))
            .then_with(|| cmp_optional(&a.scientific_name, &b.scientific_name))
    });
}

fn cmp_optional(a: &Option<String>, b: &Option<String>) -> Ordering {
    a.as_deref().cmp(&b.as_deref())
}

struct Patterns {
    caption: Regex,
    number: Regex,
    thousands: Regex,
    range: Regex,
    plus: Regex,
    more_than: Regex,
    million: Regex,
    redundant: Vec<Regex>,
    forms: Vec<(Regex, f64)>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("valid population pattern");
        Patterns {
            caption: re(r"\((.*)\)$"),
            number: re(r"\d[\d,.]*"),
            thousands: re(r",(\d{3})"),
            range: re(r"([\d.]+) *- *([\d.]+)"),
            plus: re(r"([\d.]+) *\+"),
            more_than: re(r"More than ([\d.]+)"),
            million: re(r"([\d.]+) *million"),
            redundant: [
                r" *\(plus .* in Ireland\)",
                r"Around *",
                r"Estimated *",
                r" *in spring",
                r" *\(spring\)",
                r" *\(Jersey\)",
                r" *in Great Britain;.*$",
                r" *\(\d{4} national survey\)",
                r" *\(\d{4} estimate\)\)",
            ]
            .into_iter()
            .map(re)
            .collect(),
            forms: [
                (r"(\d+)", 1.0),
                (r"(\d+) birds?", 1.0),
                (r"(\d+) individuals?", 1.0),
                (r"(\d+) pairs?", 2.0),
                (r"(\d+) females?", 2.0),
                (r"(\d+) males?", 2.0),
                (r"(\d+) territories", 2.0),
                (r"(\d+) nests", 3.0),
                (r"Approx\. (\d+) records a year", 1.0),
                (r"Between (\d+) \(in influx years\)", 0.5),
                (r"(\d+) birds \(incl\. Ireland\)", 0.6),
                (r"(\d+) *- *calling males Scotland", 2.0),
                (r"(\d+) birds from the .* population", 1.0),
                (r"(\d+) from .*, (\d+) from .* and (\d+) from .*", 1.0),
            ]
            .into_iter()
            .map(|(p, m)| (re(&format!("^{}$", p)), m))
            .collect(),
        }
    })
}

/// Estimate a number of birds from one population description.
/// Unrecognised text logs a warning and counts as 0.
pub fn abundance_from_text(text: &str) -> u64 {
    let p = patterns();

    let mut s = p.thousands.replace_all(text.trim(), "$1").into_owned();

    // 範圍取平均
    if let Some(caps) = p.range.captures(&s) {
        let a = parse_number(&caps[1]);
        let b = parse_number(&caps[2]);
        let whole = caps[0].to_string();
        let average = ((a + b) / 2.0) as u64;
        s = s.replace(&whole, &average.to_string());
    }

    if let Some(caps) = p.plus.captures(&s).or_else(|| p.more_than.captures(&s)) {
        let whole = caps[0].to_string();
        let n = (parse_number(&caps[1]) * 1.1) as u64;
        s = s.replace(&whole, &n.to_string());
    }

    if let Some(caps) = p.million.captures(&s) {
        let whole = caps[0].to_string();
        let n = (parse_number(&caps[1]) * 1_000_000.0) as u64;
        s = s.replace(&whole, &n.to_string());
    }

    // "c" for circa
    if let Some(rest) = s.strip_prefix('c') {
        s = rest.to_string();
    }
    for pattern in &p.redundant {
        s = pattern.replace_all(&s, "").into_owned();
    }

    for (form, multiplier) in &p.forms {
        if let Some(caps) = form.captures(&s) {
            let total = caps.iter().skip(1).flatten().fold(0u64, |acc, m| {
                let n = m.as_str().parse::<u64>().unwrap_or_else(|_| {
                    tracing::warn!(
                        "Number '{}' in '{}' is too large, saturating",
                        m.as_str(),
                        text
                    );
                    u64::MAX
                });
                acc.saturating_add(n)
            });
            return (total as f64 * multiplier) as u64;
        }
    }

    match s.as_str() {
        "Hundreds" => 300,
        "Very rare" => 2,
        _ => {
            tracing::warn!(
                "Could not parse a number of birds from '{}', using 0 instead",
                text
            );
            0
        }
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim_end_matches('.').parse().unwrap_or(0.0)
}
