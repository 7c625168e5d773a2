//! Flat-file persistence of cached series.
//!
//! One CSV per [`SeriesKey`] under the cache root. Files are read and
//! rewritten whole; writes go to a sibling `.tmp` file that is renamed over
//! the target.

use crate::constants::{csv_column, CACHE_CSV_HEADER};
use crate::error::{Error, Result};
use crate::models::bar::TIMESTAMP_FORMAT;
use crate::models::series_key::SERIES_FILE_EXTENSION;
use crate::models::{Bar, SeriesKey};
use crate::services::gap_fill::merge_bars;
use crate::utils::parse_naive_timestamp;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Snapshot of one persisted series, for status output
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub symbol: String,
    pub interval: String,
    pub bars: usize,
    pub first: Option<String>,
    pub latest: Option<String>,
    pub readable: bool,
}

/// Directory-backed store of cached series
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &SeriesKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Load a series, sorted ascending with unique timestamps.
    ///
    /// A missing file is an empty series. Any malformed row makes the whole
    /// file [`Error::CacheCorruption`].
    pub fn load(&self, key: &SeriesKey) -> Result<Vec<Bar>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bars = read_series_file(&path)
            .map_err(|e| Error::CacheCorruption(format!("{}: {}", path.display(), e)))?;

        debug!(series = %key, rows = bars.len(), "Loaded cached series");
        Ok(merge_bars(Vec::new(), bars))
    }

    /// Load a series, discarding the file if it is corrupt.
    ///
    /// Returns an empty series for missing and corrupt files alike.
    pub fn load_or_discard(&self, key: &SeriesKey) -> Vec<Bar> {
        match self.load(key) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(series = %key, error = %e, "Discarding unreadable cache file");
                if let Err(remove_err) = self.remove(key) {
                    warn!(series = %key, error = %remove_err, "Failed to remove corrupt cache file");
                }
                Vec::new()
            }
        }
    }

    /// Persist the full series, replacing any previous file atomically
    pub fn save(&self, key: &SeriesKey, bars: &[Bar]) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let path = self.path_for(key);
        let temp_path = path.with_extension(format!("{}.tmp", SERIES_FILE_EXTENSION));

        if let Err(e) = write_series_file(&temp_path, bars) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Io(format!(
                "Failed to replace {}: {}",
                path.display(),
                e
            )));
        }

        debug!(series = %key, rows = bars.len(), path = %path.display(), "Saved cached series");
        Ok(())
    }

    pub fn remove(&self, key: &SeriesKey) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Keys of every persisted series, sorted.
    ///
    /// Files whose names do not parse back into a key are logged and skipped.
    pub fn list_keys(&self) -> Result<Vec<SeriesKey>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::Io(format!("Failed to read cache dir {}: {}", self.root.display(), e)))?;

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(SERIES_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match SeriesKey::parse_storage_name(stem) {
                Ok(key) => keys.push(key),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping unrecognised cache file"),
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Summaries of every persisted series; corrupt files are reported, not
    /// removed
    pub fn summaries(&self) -> Result<Vec<SeriesSummary>> {
        let fmt = |bar: &Bar| bar.time.format(TIMESTAMP_FORMAT).to_string();

        Ok(self
            .list_keys()?
            .into_iter()
            .map(|key| {
                let (bars, readable) = match self.load(&key) {
                    Ok(bars) => (bars, true),
                    Err(_) => (Vec::new(), false),
                };
                SeriesSummary {
                    symbol: key.symbol.clone(),
                    interval: key.interval.to_string(),
                    bars: bars.len(),
                    first: bars.first().map(fmt),
                    latest: bars.last().map(fmt),
                    readable,
                }
            })
            .collect())
    }
}

fn parse_field(record: &csv::StringRecord, idx: usize, line: u64) -> Result<Option<f64>> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| Error::Parse(format!("line {}: invalid number '{}'", line, raw)))
}

fn read_series_file(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() != CACHE_CSV_HEADER.len() {
        return Err(Error::Parse(format!(
            "expected {} columns, found {}",
            CACHE_CSV_HEADER.len(),
            headers.len()
        )));
    }

    let mut bars = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());

        let time_str = record.get(csv_column::TIME).unwrap_or("");
        let time = parse_naive_timestamp(time_str)
            .map_err(|_| Error::Parse(format!("line {}: invalid timestamp '{}'", line, time_str)))?;

        bars.push(Bar {
            time,
            open: parse_field(&record, csv_column::OPEN, line)?,
            high: parse_field(&record, csv_column::HIGH, line)?,
            low: parse_field(&record, csv_column::LOW, line)?,
            close: parse_field(&record, csv_column::CLOSE, line)?,
            adj_close: parse_field(&record, csv_column::ADJ_CLOSE, line)?,
            volume: parse_field(&record, csv_column::VOLUME, line)?,
        });
    }

    Ok(bars)
}

fn format_field(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map_or(String::new(), |v| v.to_string())
}

fn write_series_file(path: &Path, bars: &[Bar]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CACHE_CSV_HEADER)?;

    for bar in bars {
        writer.write_record([
            bar.time.format(TIMESTAMP_FORMAT).to_string(),
            format_field(bar.open),
            format_field(bar.high),
            format_field(bar.low),
            format_field(bar.close),
            format_field(bar.adj_close),
            format_field(bar.volume),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
