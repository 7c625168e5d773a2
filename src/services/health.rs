use crate::services::history_cache::RefreshReport;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Process health snapshot served on `/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStats {
    // Refresher statistics
    pub refresh_enabled: bool,
    pub refresh_interval_secs: u64,
    pub refresh_last_run: Option<String>,
    pub refresh_iteration_count: u64,
    pub refresh_last_report: RefreshReport,
    pub refresh_total_updated: u64,
    pub refresh_total_failed: u64,

    // Cache statistics
    pub cached_series_count: usize,

    // System info
    pub uptime_secs: u64,
    pub current_system_time: String,

    #[serde(skip)]
    pub started_at: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            refresh_enabled: false,
            refresh_interval_secs: 0,
            refresh_last_run: None,
            refresh_iteration_count: 0,
            refresh_last_report: RefreshReport::default(),
            refresh_total_updated: 0,
            refresh_total_failed: 0,
            cached_series_count: 0,
            uptime_secs: 0,
            current_system_time: Utc::now().to_rfc3339(),
            started_at: Instant::now(),
        }
    }
}

impl HealthStats {
    /// Fold one refresher pass into the counters
    pub fn record_refresh(&mut self, iteration: u64, report: &RefreshReport) {
        self.refresh_iteration_count = iteration;
        self.refresh_last_run = Some(Utc::now().to_rfc3339());
        self.refresh_last_report = *report;
        self.refresh_total_updated += report.updated as u64;
        self.refresh_total_failed += report.failed as u64;
        self.cached_series_count = report.scanned;
    }
}

pub type SharedHealthStats = Arc<RwLock<HealthStats>>;
