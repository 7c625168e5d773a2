//! Instrument reference data loaded from `all_{Class}.json` files.
//!
//! Each file maps symbol → attribute object. Tables are parsed on first use
//! and kept in memory for the life of the process.

use crate::constants::{DEFAULT_AUTOCOMPLETE_LIMIT, MAX_AUTOCOMPLETE_LIMIT};
use crate::error::{Error, Result};
use crate::models::InstrumentType;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Symbol → attributes (null entries kept as `Value::Null`)
pub type InstrumentTable = BTreeMap<String, Value>;

/// Filter, paging and result of an instrument query
#[derive(Debug, Clone, Default)]
pub struct InstrumentQuery {
    /// Attribute → substring
    pub filters: BTreeMap<String, String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentPage {
    /// Matches before paging
    pub count: usize,
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub symbol: String,
    pub name: String,
}

pub type SharedReferenceStore = Arc<ReferenceStore>;

pub struct ReferenceStore {
    data_dir: PathBuf,
    tables: RwLock<HashMap<InstrumentType, Arc<InstrumentTable>>>,
}

impl ReferenceStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Keys of every supported instrument class
    pub fn list_types() -> Vec<&'static str> {
        InstrumentType::all().iter().map(|t| t.key()).collect()
    }

    fn resolve_type(type_key: &str) -> Result<InstrumentType> {
        InstrumentType::from_key(type_key).ok_or_else(|| {
            Error::NotFound(format!(
                "Unknown instrument type '{}'. Available: {}",
                type_key,
                Self::list_types().join(", ")
            ))
        })
    }

    async fn table(&self, instrument_type: InstrumentType) -> Result<Arc<InstrumentTable>> {
        if let Some(table) = self.tables.read().await.get(&instrument_type) {
            return Ok(table.clone());
        }

        let mut tables = self.tables.write().await;
        if let Some(table) = tables.get(&instrument_type) {
            return Ok(table.clone());
        }

        let path = self.data_dir.join(instrument_type.file_name());
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "No reference data for '{}' ({} missing)",
                    instrument_type,
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let table: InstrumentTable = serde_json::from_str(&raw)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;
        info!(instrument_type = %instrument_type, entries = table.len(), "Loaded reference data");

        let table = Arc::new(table);
        tables.insert(instrument_type, table.clone());
        Ok(table)
    }

    /// Filter instruments of one class, then page the matches
    pub async fn query(&self, type_key: &str, query: &InstrumentQuery) -> Result<InstrumentPage> {
        let instrument_type = Self::resolve_type(type_key)?;

        for field in query.filters.keys() {
            if !instrument_type.accepts_filter(field) {
                return Err(Error::InvalidInput(format!(
                    "Unsupported filter '{}' for {}. Allowed: {}",
                    field,
                    instrument_type,
                    instrument_type.filter_fields().join(", ")
                )));
            }
        }
        if query.limit == Some(0) {
            return Err(Error::InvalidInput("limit must be at least 1".to_string()));
        }

        let table = self.table(instrument_type).await?;
        let needles: Vec<(&str, String)> = query
            .filters
            .iter()
            .map(|(field, value)| (field.as_str(), value.to_lowercase()))
            .collect();

        let matches: Vec<Value> = table
            .iter()
            .filter_map(|(symbol, value)| with_symbol(symbol, value))
            .filter(|entry| {
                needles
                    .iter()
                    .all(|(field, needle)| attribute_text(entry, field).is_some_and(|text| text.to_lowercase().contains(needle)))
            })
            .map(Value::Object)
            .collect();

        let count = matches.len();
        let results = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        debug!(instrument_type = %instrument_type, count, "Instrument query");
        Ok(InstrumentPage { count, results })
    }

    /// Symbols or names containing `q`, case-insensitively
    pub async fn autocomplete(&self, type_key: &str, q: &str, limit: Option<usize>) -> Result<Vec<Suggestion>> {
        let instrument_type = Self::resolve_type(type_key)?;

        let q = q.trim();
        if q.is_empty() {
            return Err(Error::InvalidInput("Query 'q' must not be empty".to_string()));
        }
        let limit = limit.unwrap_or(DEFAULT_AUTOCOMPLETE_LIMIT);
        if !(1..=MAX_AUTOCOMPLETE_LIMIT).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_AUTOCOMPLETE_LIMIT
            )));
        }

        let needle = q.to_lowercase();
        let table = self.table(instrument_type).await?;

        Ok(table
            .iter()
            .filter_map(|(symbol, value)| {
                let name = value.as_object()?.get("name")?.as_str()?;
                let hit = symbol.to_lowercase().contains(&needle) || name.to_lowercase().contains(&needle);
                hit.then(|| Suggestion {
                    symbol: symbol.clone(),
                    name: name.to_string(),
                })
            })
            .take(limit)
            .collect())
    }

    /// Attribute keys of the first entry, sorted, including `symbol`
    pub async fn filter_fields(&self, type_key: &str) -> Result<Vec<String>> {
        let instrument_type = Self::resolve_type(type_key)?;
        let table = self.table(instrument_type).await?;

        let Some(entry) = table.iter().find_map(|(symbol, value)| with_symbol(symbol, value)) else {
            return Ok(Vec::new());
        };

        let mut fields: Vec<String> = entry.keys().cloned().collect();
        fields.sort();
        Ok(fields)
    }
}

/// Attribute object with the map key injected as `symbol`; `None` for null
/// or non-object entries
fn with_symbol(symbol: &str, value: &Value) -> Option<Map<String, Value>> {
    let mut entry = value.as_object()?.clone();
    entry.insert("symbol".to_string(), Value::String(symbol.to_string()));
    Some(entry)
}

fn attribute_text(entry: &Map<String, Value>, field: &str) -> Option<String> {
    match entry.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
