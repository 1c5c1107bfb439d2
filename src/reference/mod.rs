//! Startup import of the talkgroup and geography reference CSVs
//!
//! `talkgroups.csv`: `Country,Talkgroup,Name`
//! `continent_country.csv`: `Continent_Name,Continent_Code,Country_Name,Two_Letter_Country_Code`
//!
//! Rows are upserted, so rerunning an import is harmless. Incomplete rows
//! are skipped with a warning; a single failed upsert does not stop the load.

use crate::store::{run_blocking, CountryEntry, Directory, StoreError, TalkgroupEntry};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Csv(csv::Error),
    Http(reqwest::Error),
    Store(StoreError),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        LoadError::Csv(err)
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Http(err)
    }
}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        LoadError::Store(err)
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "IO error: {}", e),
            LoadError::Csv(e) => write!(f, "CSV error: {}", e),
            LoadError::Http(e) => write!(f, "HTTP error: {}", e),
            LoadError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
struct TalkgroupCsvRow {
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "Talkgroup")]
    talkgroup: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeographyCsvRow {
    #[serde(rename = "Continent_Name")]
    continent_name: Option<String>,
    #[serde(rename = "Continent_Code")]
    continent_code: Option<String>,
    #[serde(rename = "Country_Name")]
    country_name: Option<String>,
    #[serde(rename = "Two_Letter_Country_Code")]
    country_code: Option<String>,
}

fn field(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse talkgroup rows; returns the usable entries and the number skipped.
pub fn parse_talkgroups<R: Read>(reader: R) -> Result<(Vec<TalkgroupEntry>, usize), LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(reader);
    let mut entries = Vec::new();
    let mut skipped = 0;

    for (line, row) in csv_reader.deserialize::<TalkgroupCsvRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::warn!("⚠️  Talkgroup CSV row {} unreadable: {}", line + 2, e);
                skipped += 1;
                continue;
            }
        };
        match (field(row.talkgroup), field(row.country), field(row.name)) {
            (Some(talkgroup), Some(country), Some(name)) => entries.push(TalkgroupEntry { talkgroup, country, name }),
            _ => {
                log::warn!("⚠️  Talkgroup CSV row {} incomplete, skipped", line + 2);
                skipped += 1;
            }
        }
    }

    Ok((entries, skipped))
}

/// Parse geography rows; rows missing any field are skipped.
pub fn parse_geography<R: Read>(reader: R) -> Result<(Vec<CountryEntry>, usize), LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(reader);
    let mut entries = Vec::new();
    let mut skipped = 0;

    for (line, row) in csv_reader.deserialize::<GeographyCsvRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::warn!("⚠️  Geography CSV row {} unreadable: {}", line + 2, e);
                skipped += 1;
                continue;
            }
        };
        match (
            field(row.country_name),
            field(row.continent_name),
            field(row.continent_code),
            field(row.country_code),
        ) {
            (Some(country_name), Some(continent_name), Some(continent_code), Some(country_code)) => {
                entries.push(CountryEntry {
                    country_name,
                    continent_name,
                    continent_code,
                    country_code,
                })
            }
            _ => {
                log::warn!("⚠️  Geography CSV row {} missing fields, skipped", line + 2);
                skipped += 1;
            }
        }
    }

    Ok((entries, skipped))
}

pub fn import_talkgroups(directory: &Directory, entries: &[TalkgroupEntry], skipped: usize) -> LoadReport {
    let mut report = LoadReport {
        skipped,
        ..Default::default()
    };
    for entry in entries {
        match directory.upsert_talkgroup(entry) {
            Ok(()) => report.loaded += 1,
            Err(e) => {
                log::error!("❌ Failed to upsert talkgroup {}: {}", entry.talkgroup, e);
                report.failed += 1;
            }
        }
    }
    report
}

pub fn import_geography(directory: &Directory, entries: &[CountryEntry], skipped: usize) -> LoadReport {
    let mut report = LoadReport {
        skipped,
        ..Default::default()
    };
    for entry in entries {
        match directory.upsert_country(entry) {
            Ok(()) => report.loaded += 1,
            Err(e) => {
                log::error!("❌ Failed to upsert country {}: {}", entry.country_name, e);
                report.failed += 1;
            }
        }
    }
    report
}

pub fn load_talkgroups_csv(directory: &Directory, path: impl AsRef<Path>) -> Result<LoadReport, LoadError> {
    let file = std::fs::File::open(path.as_ref())?;
    let (entries, skipped) = parse_talkgroups(file)?;
    Ok(import_talkgroups(directory, &entries, skipped))
}

pub fn load_geography_csv(directory: &Directory, path: impl AsRef<Path>) -> Result<LoadReport, LoadError> {
    let file = std::fs::File::open(path.as_ref())?;
    let (entries, skipped) = parse_geography(file)?;
    Ok(import_geography(directory, &entries, skipped))
}

pub async fn load_geography_from_url(directory: &Directory, url: &str) -> Result<LoadReport, LoadError> {
    let body = reqwest::get(url).await?.error_for_status()?.bytes().await?;
    let (entries, skipped) = parse_geography(body.as_ref())?;

    let directory = directory.clone();
    let report = run_blocking(move || Ok(import_geography(&directory, &entries, skipped))).await?;
    Ok(report)
}

fn log_report(kind: &str, source: &str, result: Result<LoadReport, LoadError>) {
    match result {
        Ok(report) => log::info!(
            "✅ Imported {} {} from {} ({} skipped, {} failed)",
            report.loaded,
            kind,
            source,
            report.skipped,
            report.failed
        ),
        Err(LoadError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("⚠️  {} file {} not found, skipping import", kind, source)
        }
        Err(e) => log::error!("❌ Failed to import {} from {}: {}", kind, source, e),
    }
}

/// Import both reference sets at startup. Never fails: problems are logged.
pub async fn load_reference_data(directory: &Directory, talkgroups_csv: &str, geography_source: &str) {
    let tg_directory = directory.clone();
    let tg_path = talkgroups_csv.to_string();
    let result = run_blocking(move || Ok(load_talkgroups_csv(&tg_directory, &tg_path)))
        .await
        .unwrap_or_else(|e| Err(LoadError::Store(e)));
    log_report("talkgroups", talkgroups_csv, result);

    let result = if geography_source.starts_with("http://") || geography_source.starts_with("https://") {
        load_geography_from_url(directory, geography_source).await
    } else {
        let geo_directory = directory.clone();
        let geo_path = geography_source.to_string();
        run_blocking(move || Ok(load_geography_csv(&geo_directory, &geo_path)))
            .await
            .unwrap_or_else(|e| Err(LoadError::Store(e)))
    };
    log_report("countries", geography_source, result);
}
