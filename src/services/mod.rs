pub mod gap_fill;
pub mod health;
pub mod history_cache;
pub mod provider;
pub mod reference_store;
pub mod series_store;
pub mod taxonomy_store;
pub mod yahoo;

pub use health::{HealthStats, SharedHealthStats};
pub use history_cache::{
    HistoryCache, HistoryRequest, RefreshReport, SeriesView, SharedHistoryCache, StartBound,
};
pub use provider::{MarketDataProvider, ProviderError};
pub use reference_store::{InstrumentPage, InstrumentQuery, ReferenceStore, SharedReferenceStore, Suggestion};
pub use series_store::{SeriesStore, SeriesSummary};
pub use taxonomy_store::{SharedTaxonomyStore, TaxonomyStore};
pub use yahoo::YahooClient;
