//! Instrument classes of the reference dataset.
//!
//! Each class is stored as one pre-materialized JSON file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter keys accepted for every instrument class
const COMMON_FILTERS: &[&str] = &["symbol", "name", "exchange"];

const EQUITY_FILTERS: &[&str] = &[
    "currency",
    "summary",
    "sector",
    "industry_group",
    "industry",
    "market",
    "country",
    "state",
    "city",
    "zipcode",
    "website",
    "market_cap",
    "isin",
    "cusip",
    "figi",
    "composite_figi",
    "shareclass_figi",
];
const CURRENCY_FILTERS: &[&str] = &["base_currency", "quote_currency", "summary"];
const CRYPTO_FILTERS: &[&str] = &["cryptocurrency", "currency", "summary"];
const FAMILY_FILTERS: &[&str] = &["currency", "summary", "category_group", "category", "family"];
const INDEX_FILTERS: &[&str] = &["currency", "summary", "category_group", "category"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Equities,
    Currencies,
    Cryptos,
    Etfs,
    Funds,
    Indices,
    Moneymarkets,
}

impl InstrumentType {
    /// Get all instrument types in listing order
    pub fn all() -> Vec<InstrumentType> {
        vec![
            InstrumentType::Equities,
            InstrumentType::Currencies,
            InstrumentType::Cryptos,
            InstrumentType::Etfs,
            InstrumentType::Funds,
            InstrumentType::Indices,
            InstrumentType::Moneymarkets,
        ]
    }

    /// Parse from a route key (case-insensitive)
    pub fn from_key(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|t| t.key().eq_ignore_ascii_case(s.trim()))
    }

    /// Route key
    pub fn key(&self) -> &'static str {
        match self {
            InstrumentType::Equities => "equities",
            InstrumentType::Currencies => "currencies",
            InstrumentType::Cryptos => "cryptos",
            InstrumentType::Etfs => "etfs",
            InstrumentType::Funds => "funds",
            InstrumentType::Indices => "indices",
            InstrumentType::Moneymarkets => "moneymarkets",
        }
    }

    /// Data file holding this class
    pub fn file_name(&self) -> &'static str {
        match self {
            InstrumentType::Equities => "all_Equities.json",
            InstrumentType::Currencies => "all_Currencies.json",
            InstrumentType::Cryptos => "all_Cryptos.json",
            InstrumentType::Etfs => "all_ETFs.json",
            InstrumentType::Funds => "all_Funds.json",
            InstrumentType::Indices => "all_Indices.json",
            InstrumentType::Moneymarkets => "all_Moneymarkets.json",
        }
    }

    fn specific_filters(&self) -> &'static [&'static str] {
        match self {
            InstrumentType::Equities => EQUITY_FILTERS,
            InstrumentType::Currencies => CURRENCY_FILTERS,
            InstrumentType::Cryptos => CRYPTO_FILTERS,
            InstrumentType::Etfs | InstrumentType::Funds | InstrumentType::Moneymarkets => {
                FAMILY_FILTERS
            }
            InstrumentType::Indices => INDEX_FILTERS,
        }
    }

    /// Query keys accepted as filters for this class
    pub fn filter_fields(&self) -> Vec<&'static str> {
        COMMON_FILTERS
            .iter()
            .chain(self.specific_filters().iter())
            .copied()
            .collect()
    }

    /// Whether `field` is part of this class's filter schema
    pub fn accepts_filter(&self, field: &str) -> bool {
        COMMON_FILTERS.contains(&field) || self.specific_filters().contains(&field)
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
