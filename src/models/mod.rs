mod app_config;
pub mod bar;
mod corporate_events;
mod gics;
mod instrument_type;
mod interval;
mod news;
pub mod series_key;

pub use app_config::{AppConfig, CacheConfig};
pub use bar::{Bar, BarRow};
pub use corporate_events::{CorporateEvents, Dividend, Split};
pub use gics::{
    GicsEntry, GicsFilter, GicsRecord, IndustryGroupNode, IndustryNode, SectorNode, SubIndustryNode,
};
pub use instrument_type::InstrumentType;
pub use interval::Interval;
pub use news::NewsItem;
pub use series_key::SeriesKey;
