//! Incremental OHLCV history cache.
//!
//! Both the read path ([`HistoryCache::get_series`]) and the scheduled
//! refresher ([`HistoryCache::refresh_all`]) go through
//! [`HistoryCache::fill_gap`], which is the only place that fetches, merges
//! and persists. Every load → merge → persist cycle holds the per-key lock.

use crate::error::{Error, Result};
use crate::models::{Bar, BarRow, CacheConfig, SeriesKey};
use crate::services::gap_fill::{fetch_windows, merge_bars, next_fetch_start, plan_windows};
use crate::services::provider::MarketDataProvider;
use crate::services::series_store::SeriesStore;
use crate::utils::parse_naive_timestamp;
use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Sentinel accepted as a start bound meaning "as far back as allowed"
pub const AUTO_START: &str = "auto";

/// Requested lower bound of a history read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartBound {
    /// Start at the interval window floor
    #[default]
    Auto,
    At(NaiveDateTime),
}

impl StartBound {
    /// Parse a query value; absent or `auto` (any case) is [`StartBound::Auto`]
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(StartBound::Auto),
            Some(s) if s.eq_ignore_ascii_case(AUTO_START) => Ok(StartBound::Auto),
            Some(s) => parse_naive_timestamp(s).map(StartBound::At),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub key: SeriesKey,
    pub start: StartBound,
    /// Defaults to now; later values are clamped to now
    pub end: Option<NaiveDateTime>,
    pub limit: usize,
}

/// Response view of a cached series
#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    /// Size of the full merged series
    pub count: usize,
    /// Newest first, at most `limit` rows
    pub rows: Vec<BarRow>,
}

impl SeriesView {
    fn from_bars(bars: &[Bar], limit: usize) -> Self {
        Self {
            count: bars.len(),
            rows: bars.iter().rev().take(limit).map(BarRow::from).collect(),
        }
    }
}

/// Result of one gap-fill
#[derive(Debug)]
pub struct GapFill {
    /// Full series after the merge, ascending
    pub bars: Vec<Bar>,
    pub fetched: usize,
    pub windows: usize,
    pub failed_windows: usize,
}

/// Per-series result of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New bars were merged and persisted
    Updated { fetched: usize },
    /// Already current, or the provider had nothing new
    Unchanged,
    /// Nothing cached to extend
    Skipped,
}

/// Totals of one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub scanned: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub type SharedHistoryCache = Arc<HistoryCache>;

pub struct HistoryCache {
    config: CacheConfig,
    store: SeriesStore,
    provider: Arc<dyn MarketDataProvider>,
    locks: Mutex<HashMap<SeriesKey, Arc<Mutex<()>>>>,
}

impl HistoryCache {
    pub fn new(config: CacheConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let store = SeriesStore::new(config.cache_root.clone());
        Self {
            config,
            store,
            provider,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    async fn lock_for(&self, key: &SeriesKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the key's map entry once no other task holds or waits on it
    async fn release_lock(&self, key: &SeriesKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        let unshared = locks
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if unshared {
            locks.remove(key);
        }
    }

    /// Run a store operation on the blocking pool
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SeriesStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| Error::Io(format!("Cache store task failed: {}", e)))?
    }

    /// Keys of every persisted series, read off the async workers
    pub async fn cached_keys(&self) -> Result<Vec<SeriesKey>> {
        self.with_store(|store| store.list_keys()).await
    }

    /// Serve a history read, filling the gap up to the requested end first
    pub async fn get_series(&self, request: &HistoryRequest) -> Result<SeriesView> {
        self.get_series_at(request, Utc::now().naive_utc()).await
    }

    #[instrument(skip(self, request), fields(series = %request.key))]
    pub async fn get_series_at(&self, request: &HistoryRequest, now: NaiveDateTime) -> Result<SeriesView> {
        let key = &request.key;
        let window = key.interval.window();
        let floor = now - window;

        let start = match request.start {
            StartBound::Auto => floor,
            StartBound::At(t) => t.max(floor),
        };
        let end = request.end.map_or(now, |e| e.min(now));

        let lock = self.lock_for(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.read_locked(key, start, end, floor, window).await
        };
        self.release_lock(key, lock).await;

        let bars = result?;
        if bars.is_empty() {
            return Err(Error::NotFound(format!(
                "No data found for {} at interval {}",
                key.symbol, key.interval
            )));
        }

        Ok(SeriesView::from_bars(&bars, request.limit))
    }

    async fn read_locked(
        &self,
        key: &SeriesKey,
        start: NaiveDateTime,
        end: NaiveDateTime,
        floor: NaiveDateTime,
        window: Duration,
    ) -> Result<Vec<Bar>> {
        let load_key = key.clone();
        let existing = self
            .with_store(move |store| Ok(store.load_or_discard(&load_key)))
            .await?;
        let fetch_from = next_fetch_start(&existing, start, floor);
        debug!(
            cached = existing.len(),
            fetch_from = %fetch_from,
            end = %end,
            "Resolved fetch range"
        );

        let fill = self.fill_gap(key, existing, fetch_from, end, Some(window)).await?;
        Ok(fill.bars)
    }

    /// Extend `existing` over `[from, to]` and persist when anything arrived.
    ///
    /// `chunk` bounds each provider call; `None` fetches the range in one call.
    /// Caller must hold the key's lock.
    pub async fn fill_gap(
        &self,
        key: &SeriesKey,
        existing: Vec<Bar>,
        from: NaiveDateTime,
        to: NaiveDateTime,
        chunk: Option<Duration>,
    ) -> Result<GapFill> {
        let windows = plan_windows(from, to, chunk);
        if windows.is_empty() {
            return Ok(GapFill {
                bars: existing,
                fetched: 0,
                windows: 0,
                failed_windows: 0,
            });
        }

        let outcome = fetch_windows(self.provider.as_ref(), key, &windows, self.config.fetch_timeout).await;
        let fetched = outcome.bars.len();

        if outcome.failed_windows > 0 {
            warn!(
                series = %key,
                failed = outcome.failed_windows,
                windows = outcome.windows,
                "Some fetch windows failed"
            );
        }

        let bars = if fetched > 0 {
            let merged = merge_bars(existing, outcome.bars);
            let save_key = key.clone();
            self.with_store(move |store| store.save(&save_key, &merged).map(|()| merged))
                .await?
        } else {
            existing
        };

        Ok(GapFill {
            bars,
            fetched,
            windows: outcome.windows,
            failed_windows: outcome.failed_windows,
        })
    }

    /// Extend one persisted series up to `now` with a single provider call
    pub async fn refresh_series_at(&self, key: &SeriesKey, now: NaiveDateTime) -> Result<RefreshOutcome> {
        let lock = self.lock_for(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.refresh_locked(key, now).await
        };
        self.release_lock(key, lock).await;
        result
    }

    async fn refresh_locked(&self, key: &SeriesKey, now: NaiveDateTime) -> Result<RefreshOutcome> {
        let load_key = key.clone();
        let existing = match self.with_store(move |store| store.load(&load_key)).await {
            Ok(bars) => bars,
            Err(e @ Error::CacheCorruption(_)) => {
                warn!(series = %key, error = %e, "Discarding corrupt series during refresh");
                let remove_key = key.clone();
                self.with_store(move |store| store.remove(&remove_key)).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if existing.is_empty() {
            return Ok(RefreshOutcome::Skipped);
        }

        let floor = now - key.interval.window();
        let fetch_from = next_fetch_start(&existing, floor, floor);
        let fill = self.fill_gap(key, existing, fetch_from, now, None).await?;

        if fill.windows > 0 && fill.failed_windows == fill.windows {
            return Err(Error::Upstream(format!("Refresh fetch failed for {}", key)));
        }
        if fill.fetched == 0 {
            Ok(RefreshOutcome::Unchanged)
        } else {
            Ok(RefreshOutcome::Updated { fetched: fill.fetched })
        }
    }

    /// Refresh every persisted series
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        self.refresh_all_at(Utc::now().naive_utc()).await
    }

    /// One refresher pass; errors for a single series are logged and counted
    pub async fn refresh_all_at(&self, now: NaiveDateTime) -> Result<RefreshReport> {
        let keys = self.cached_keys().await?;
        let mut report = RefreshReport {
            scanned: keys.len(),
            ..Default::default()
        };

        for key in &keys {
            match self.refresh_series_at(key, now).await {
                Ok(RefreshOutcome::Updated { fetched }) => {
                    report.updated += 1;
                    info!(series = %key, fetched, "Refreshed series");
                }
                Ok(RefreshOutcome::Unchanged) => report.unchanged += 1,
                Ok(RefreshOutcome::Skipped) => {
                    report.skipped += 1;
                    debug!(series = %key, "Skipping empty series");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(series = %key, error = %e, "Refresh failed");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::bar::TIMESTAMP_FORMAT;
    use crate::models::Interval;
    use crate::services::provider::ProviderError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    /// Provider serving bars from an in-memory universe, recording each call
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        universe: StdMutex<BTreeMap<NaiveDateTime, Bar>>,
        calls: StdMutex<Vec<(NaiveDateTime, NaiveDateTime)>>,
        fail_calls: StdMutex<Vec<usize>>,
        delays: StdMutex<HashMap<usize, StdDuration>>,
    }

    impl FakeProvider {
        pub(crate) fn with_bars(bars: Vec<Bar>) -> Self {
            let provider = Self::default();
            provider.add_bars(bars);
            provider
        }

        pub(crate) fn add_bars(&self, bars: Vec<Bar>) {
            let mut universe = self.universe.lock().unwrap();
            for bar in bars {
                universe.insert(bar.time, bar);
            }
        }

        /// Make the n-th call (0-based) fail
        pub(crate) fn fail_call(&self, n: usize) {
            self.fail_calls.lock().unwrap().push(n);
        }

        /// Make the n-th call (0-based) wait before answering
        pub(crate) fn delay_call(&self, n: usize, delay: StdDuration) {
            self.delays.lock().unwrap().insert(n, delay);
        }

        pub(crate) fn calls(&self) -> Vec<(NaiveDateTime, NaiveDateTime)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarketDataProvider for FakeProvider {
        async fn fetch_bars(
            &self,
            _symbol: &str,
            _interval: Interval,
            start: NaiveDateTime,
            end: NaiveDateTime,
        ) -> std::result::Result<Vec<Bar>, ProviderError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((start, end));
                calls.len() - 1
            };
            let delay = self.delays.lock().unwrap().get(&index).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_calls.lock().unwrap().contains(&index) {
                return Err(ProviderError::Api("boom".to_string()));
            }
            let universe = self.universe.lock().unwrap();
            Ok(universe.range(start..=end).map(|(_, bar)| bar.clone()).collect())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn daily_bars(from: NaiveDateTime, n: i64) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(from + Duration::days(i), 100.0 + i as f64, 101.0, 99.0, 100.5 + i as f64, 1e6))
            .collect()
    }

    fn hourly_bar(hours_ago: i64) -> Bar {
        Bar::new(now() - Duration::hours(hours_ago), 1.0, 1.0, 1.0, hours_ago as f64, 1.0)
    }

    fn cache_with(dir: &std::path::Path, provider: Arc<FakeProvider>) -> HistoryCache {
        HistoryCache::new(CacheConfig::new(dir.to_path_buf()), provider)
    }

    fn request(symbol: &str, interval: Interval, limit: usize) -> HistoryRequest {
        HistoryRequest {
            key: SeriesKey::new(symbol, interval).unwrap(),
            start: StartBound::Auto,
            end: None,
            limit,
        }
    }

    #[test]
    fn test_start_bound_parse() {
        assert_eq!(StartBound::parse(None).unwrap(), StartBound::Auto);
        assert_eq!(StartBound::parse(Some("AUTO")).unwrap(), StartBound::Auto);
        assert_eq!(
            StartBound::parse(Some("2024-01-02")).unwrap(),
            StartBound::At(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
        assert!(matches!(StartBound::parse(Some("yesterday")), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_cache_daily_backfill() {
        let dir = tempdir().unwrap();
        let first = now() - Duration::days(120);
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(first, 100)));
        let cache = cache_with(dir.path(), provider.clone());

        let view = cache.get_series_at(&request("AAPL", Interval::Day1, 10), now()).await.unwrap();

        assert_eq!(view.count, 100);
        assert_eq!(view.rows.len(), 10);
        let newest = (first + Duration::days(99)).format(TIMESTAMP_FORMAT).to_string();
        assert_eq!(view.rows[0].time, newest);
        assert!(view.rows.windows(2).all(|w| w[0].time > w[1].time));

        let key = SeriesKey::new("AAPL", Interval::Day1).unwrap();
        assert_eq!(cache.store().load(&key).unwrap().len(), 100);

        // 3650-day window fits in one call starting at the floor
        let calls = provider.calls();
        assert_eq!(calls, vec![(now() - Duration::days(3650), now())]);
    }

    #[tokio::test]
    async fn test_resolved_start_never_below_floor() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(now() - Duration::days(3), 3)));
        let cache = cache_with(dir.path(), provider.clone());

        for interval in Interval::all() {
            let mut req = request("MSFT", interval, 5);
            req.start = StartBound::At(now() - Duration::days(20_000));
            let _ = cache.get_series_at(&req, now()).await;
        }

        let calls = provider.calls();
        assert!(!calls.is_empty());
        for interval in Interval::all() {
            let floor = now() - interval.window();
            assert!(calls.iter().any(|(start, _)| *start == floor));
        }
        let widest = now() - Duration::days(3650);
        assert!(calls.iter().all(|(start, end)| *start >= widest && *end <= now()));
    }

    #[tokio::test]
    async fn test_second_read_fetches_only_suffix() {
        let dir = tempdir().unwrap();
        let first = now() - Duration::days(10);
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(first, 5)));
        let cache = cache_with(dir.path(), provider.clone());
        let req = request("AAPL", Interval::Day1, 100);

        cache.get_series_at(&req, now()).await.unwrap();
        provider.add_bars(daily_bars(first + Duration::days(5), 2));
        let view = cache.get_series_at(&req, now()).await.unwrap();

        assert_eq!(view.count, 7);
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, first + Duration::days(4) + Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_end_in_future_is_clamped() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(now() - Duration::days(2), 2)));
        let cache = cache_with(dir.path(), provider.clone());

        let mut req = request("AAPL", Interval::Day1, 100);
        req.end = Some(now() + Duration::days(30));
        cache.get_series_at(&req, now()).await.unwrap();

        assert!(provider.calls().iter().all(|(_, end)| *end <= now()));
    }

    #[tokio::test]
    async fn test_no_data_is_not_found() {
        let dir = tempdir().unwrap();
        let cache = cache_with(dir.path(), Arc::new(FakeProvider::default()));

        let err = cache.get_series_at(&request("NOPE", Interval::Hour1, 10), now()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(cache.store().list_keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_window_mid_backfill_keeps_partial_data() {
        let dir = tempdir().unwrap();
        // Hourly bars across the whole 1m window
        let first = now() - Duration::days(7);
        let bars: Vec<Bar> = (0..7 * 24)
            .map(|h| Bar::new(first + Duration::hours(h), 1.0, 1.0, 1.0, h as f64, 1.0))
            .collect();
        let provider = Arc::new(FakeProvider::with_bars(bars));
        let cache = cache_with(dir.path(), provider.clone());
        let key = SeriesKey::new("BTC-USD", Interval::Minute1).unwrap();

        // Seed a stale cache so the fill spans several chunks from the floor
        let floor = now() - Duration::days(7);
        let windows = plan_windows(floor, now(), Some(Duration::days(2)));
        assert_eq!(windows.len(), 4);
        provider.fail_call(1);

        let fill = cache.fill_gap(&key, Vec::new(), floor, now(), Some(Duration::days(2))).await.unwrap();
        assert_eq!(fill.windows, 4);
        assert_eq!(fill.failed_windows, 1);

        let missing = windows[1];
        assert!(fill.bars.iter().all(|b| b.time < missing.start || b.time > missing.end));
        assert!(fill.bars.iter().any(|b| b.time > missing.end));
        assert!(fill.bars.iter().any(|b| b.time < missing.start));
        assert_eq!(cache.store().load(&key).unwrap().len(), fill.bars.len());
    }

    #[tokio::test]
    async fn test_corrupt_file_refetches_from_floor() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(now() - Duration::days(3), 3)));
        let cache = cache_with(dir.path(), provider.clone());
        let key = SeriesKey::new("AAPL", Interval::Hour1).unwrap();

        fs::write(
            cache.store().path_for(&key),
            "Datetime,Open,High,Low,Close,Adj Close,Volume\n2024-05-31 00:00:00,abc,1,1,1,1,1\n",
        )
        .unwrap();

        let view = cache.get_series_at(&request("AAPL", Interval::Hour1, 10), now()).await.unwrap();
        assert_eq!(view.count, 3);
        assert_eq!(provider.calls()[0].0, now() - Duration::days(730));
        assert_eq!(cache.store().load(&key).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_fetches_exact_suffix() {
        let dir = tempdir().unwrap();
        let t = now() - Duration::minutes(5);
        let existing: Vec<Bar> = (0..10)
            .map(|i| Bar::new(t - Duration::minutes(10 - 1 - i), 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let provider = Arc::new(FakeProvider::default());
        let cache = cache_with(dir.path(), provider.clone());
        let key = SeriesKey::new("ES=F", Interval::Minute1).unwrap();
        cache.store().save(&key, &existing).unwrap();

        provider.add_bars(
            (1..=3)
                .map(|i| Bar::new(t + Duration::minutes(i), 2.0, 2.0, 2.0, 2.0, 2.0))
                .collect(),
        );

        let outcome = cache.refresh_series_at(&key, now()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { fetched: 3 });
        assert_eq!(provider.calls(), vec![(t + Duration::minutes(1), now())]);
        assert_eq!(cache.store().load(&key).unwrap().len(), 13);
    }

    #[tokio::test]
    async fn test_refresh_all_continues_past_failures() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(now() - Duration::days(1), 1)));
        let cache = cache_with(dir.path(), provider.clone());

        let old = daily_bars(now() - Duration::days(5), 2);
        let a = SeriesKey::new("AAA", Interval::Day1).unwrap();
        let b = SeriesKey::new("BBB", Interval::Day1).unwrap();
        let c = SeriesKey::new("CCC", Interval::Day1).unwrap();
        cache.store().save(&a, &old).unwrap();
        cache.store().save(&b, &old).unwrap();
        cache.store().save(&c, &[]).unwrap();
        fs::write(dir.path().join("DDD_1d.csv"), "garbage\n1,2\n").unwrap();

        // First call (AAA) fails, BBB succeeds
        provider.fail_call(0);
        let report = cache.refresh_all_at(now()).await.unwrap();

        assert_eq!(report.scanned, 4);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(cache.store().load(&b).unwrap().len(), 3);
        assert!(!dir.path().join("DDD_1d.csv").exists());
    }

    #[tokio::test]
    async fn test_refresh_current_series_is_unchanged() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let cache = cache_with(dir.path(), provider.clone());
        let key = SeriesKey::new("AAPL", Interval::Day1).unwrap();
        cache.store().save(&key, &daily_bars(now() - Duration::days(2), 2)).unwrap();

        assert_eq!(cache.refresh_series_at(&key, now()).await.unwrap(), RefreshOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_not_found() {
        let dir = tempdir().unwrap();
        let cache = cache_with(dir.path(), Arc::new(FakeProvider::default()));

        for i in 0..200 {
            let err = cache
                .get_series_at(&request(&format!("NOPE{}", i), Interval::Day1, 10), now())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotFound(_)));
        }

        assert!(cache.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_read_and_refresh() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::with_bars(daily_bars(now() - Duration::days(3), 3)));
        let cache = cache_with(dir.path(), provider);
        let key = SeriesKey::new("AAPL", Interval::Day1).unwrap();

        cache.get_series_at(&request("AAPL", Interval::Day1, 10), now()).await.unwrap();
        cache.refresh_series_at(&key, now()).await.unwrap();

        assert!(cache.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_read_and_refresh_keep_every_bar() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(FakeProvider::with_bars((0..=5).map(hourly_bar).collect()));
        let cache = Arc::new(cache_with(dir.path(), provider.clone()));
        let key = SeriesKey::new("AAPL", Interval::Hour1).unwrap();
        cache.store().save(&key, &[hourly_bar(5), hourly_bar(4)]).unwrap();

        // The read stalls inside its fetch while holding the key
        provider.delay_call(0, StdDuration::from_millis(100));

        let mut read = request("AAPL", Interval::Hour1, 100);
        read.end = Some(now() - Duration::hours(2));
        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_series_at(&read, now()).await })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let refresher = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.refresh_series_at(&key, now()).await })
        };

        let view = reader.await.unwrap().unwrap();
        let outcome = refresher.await.unwrap().unwrap();

        assert_eq!(view.count, 4);
        assert_eq!(outcome, RefreshOutcome::Updated { fetched: 2 });
        // The refresh started from what the read persisted
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, now() - Duration::hours(2) + Duration::minutes(1));
        assert_eq!(cache.store().load(&key).unwrap().len(), 6);
    }
}
