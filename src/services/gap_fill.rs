//! Gap-fill primitives: fetch-window planning, provider fan-out and merging.
//!
//! The history cache composes these under its per-series lock; nothing here
//! touches the filesystem.

use crate::constants::FETCH_STEP_MINUTES;
use crate::models::{Bar, SeriesKey};
use crate::services::provider::{MarketDataProvider, ProviderError};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

/// Inclusive `[start, end]` range handed to the provider in one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Bars gathered across all windows of one gap-fill
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Fetched bars in fetch order (may contain duplicates)
    pub bars: Vec<Bar>,
    pub windows: usize,
    pub failed_windows: usize,
}

fn fetch_step() -> Duration {
    Duration::minutes(FETCH_STEP_MINUTES)
}

/// Split `[from, to]` into consecutive windows.
///
/// With `chunk`, each window spans at most `chunk` and the next one starts one
/// step after the previous end. Without it, the whole range is one window.
/// Empty when `from >= to`.
pub fn plan_windows(from: NaiveDateTime, to: NaiveDateTime, chunk: Option<Duration>) -> Vec<FetchWindow> {
    if from >= to {
        return Vec::new();
    }

    let Some(chunk) = chunk else {
        return vec![FetchWindow { start: from, end: to }];
    };

    let mut windows = Vec::new();
    let mut cursor = from;
    while cursor < to {
        let end = (cursor + chunk).min(to);
        windows.push(FetchWindow { start: cursor, end });
        cursor = end + fetch_step();
    }
    windows
}

/// Where the next fetch starts: one step past the newest cached bar, or
/// `fallback` for an empty series. Never earlier than `floor`.
pub fn next_fetch_start(existing: &[Bar], fallback: NaiveDateTime, floor: NaiveDateTime) -> NaiveDateTime {
    let start = existing
        .iter()
        .map(|bar| bar.time)
        .max()
        .map_or(fallback, |latest| latest + fetch_step());
    start.max(floor)
}

/// Merge `fetched` into `existing`.
///
/// Later bars win on equal timestamps, so fetched data overrides cached data
/// and later windows override earlier ones. Output is ascending by time.
pub fn merge_bars(existing: Vec<Bar>, fetched: Vec<Bar>) -> Vec<Bar> {
    let mut by_time: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
    for bar in existing.into_iter().chain(fetched) {
        by_time.insert(bar.time, bar);
    }
    by_time.into_values().collect()
}

/// Fetch every window in order, each bounded by `timeout`.
///
/// Failed, timed-out and empty windows are logged and skipped.
pub async fn fetch_windows(
    provider: &dyn MarketDataProvider,
    key: &SeriesKey,
    windows: &[FetchWindow],
    timeout: StdDuration,
) -> FetchOutcome {
    let mut outcome = FetchOutcome {
        windows: windows.len(),
        ..Default::default()
    };

    for window in windows {
        let call = provider.fetch_bars(&key.symbol, key.interval, window.start, window.end);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(bars)) if bars.is_empty() => {
                debug!(series = %key, start = %window.start, end = %window.end, "No bars in window");
            }
            Ok(Ok(bars)) => {
                debug!(series = %key, start = %window.start, end = %window.end, bars = bars.len(), "Fetched window");
                outcome.bars.extend(bars);
            }
            Ok(Err(ProviderError::NoData)) => {
                debug!(series = %key, start = %window.start, end = %window.end, "Provider has no data for window");
            }
            Ok(Err(e)) => {
                outcome.failed_windows += 1;
                warn!(series = %key, start = %window.start, end = %window.end, error = %e, "Window fetch failed, skipping");
            }
            Err(_) => {
                outcome.failed_windows += 1;
                warn!(
                    series = %key,
                    start = %window.start,
                    end = %window.end,
                    timeout_secs = timeout.as_secs(),
                    "Window fetch timed out, skipping"
                );
            }
        }
    }

    outcome
}
