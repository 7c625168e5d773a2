use crate::services::{RefreshReport, SharedHealthStats, SharedHistoryCache};
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Run one refresher pass and fold it into the health stats
pub async fn run_once(
    cache: &SharedHistoryCache,
    health_stats: &SharedHealthStats,
    iteration: u64,
) -> Option<RefreshReport> {
    let loop_start = Instant::now();

    match cache.refresh_all().await {
        Ok(report) => {
            info!(
                iteration,
                scanned = report.scanned,
                updated = report.updated,
                unchanged = report.unchanged,
                failed = report.failed,
                skipped = report.skipped,
                loop_duration_secs = loop_start.elapsed().as_secs_f64(),
                "Refresh worker: Pass completed"
            );
            health_stats.write().await.record_refresh(iteration, &report);
            Some(report)
        }
        Err(e) => {
            error!(iteration, error = %e, "Refresh worker: Pass failed");
            None
        }
    }
}

/// Periodically extend every cached series until `shutdown` flips to true
#[instrument(skip(cache, health_stats, shutdown))]
pub async fn run(cache: SharedHistoryCache, health_stats: SharedHealthStats, mut shutdown: watch::Receiver<bool>) {
    let refresh_interval = cache.config().refresh_interval;
    info!(
        interval_secs = refresh_interval.as_secs(),
        cache_root = %cache.config().cache_root.display(),
        "Starting refresh worker"
    );

    {
        let mut health = health_stats.write().await;
        health.refresh_enabled = true;
        health.refresh_interval_secs = refresh_interval.as_secs();
    }

    let mut iteration_count = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        iteration_count += 1;
        info!(iteration = iteration_count, "Refresh worker: Starting pass");
        run_once(&cache, &health_stats, iteration_count).await;

        tokio::select! {
            _ = sleep(refresh_interval) => {}
            changed = shutdown.changed() => {
                // Sender dropped or shutdown requested
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    health_stats.write().await.refresh_enabled = false;
    info!(iterations = iteration_count, "Refresh worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, CacheConfig, Interval, SeriesKey};
    use crate::services::history_cache::tests::FakeProvider;
    use crate::services::{HealthStats, HistoryCache};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;
    use tokio::sync::RwLock;

    #[tokio::test]
    async fn test_worker_refreshes_and_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let now = Utc::now().naive_utc();
        let provider = Arc::new(FakeProvider::with_bars(vec![Bar::new(
            now - Duration::hours(1),
            2.0,
            2.0,
            2.0,
            2.0,
            2.0,
        )]));
        let config = CacheConfig::new(dir.path().to_path_buf()).with_refresh_interval(StdDuration::from_secs(3600));
        let cache = Arc::new(HistoryCache::new(config, provider));

        let key = SeriesKey::new("AAPL", Interval::Day1).unwrap();
        cache
            .store()
            .save(&key, &[Bar::new(now - Duration::days(2), 1.0, 1.0, 1.0, 1.0, 1.0)])
            .unwrap();

        let health: SharedHealthStats = Arc::new(RwLock::new(HealthStats::default()));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(cache.clone(), health.clone(), rx));

        // First pass runs immediately; wait for it to land
        for _ in 0..100 {
            if health.read().await.refresh_iteration_count >= 1 {
                break;
            }
            sleep(StdDuration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();

        let stats = health.read().await;
        assert_eq!(stats.refresh_iteration_count, 1);
        assert_eq!(stats.refresh_last_report.updated, 1);
        assert!(!stats.refresh_enabled);
        assert_eq!(cache.store().load(&key).unwrap().len(), 2);
    }
}
