use crate::models::AppConfig;
use crate::services::{HealthStats, HistoryCache, YahooClient};
use crate::worker;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Run the refresher without the HTTP server.
///
/// Shares nothing with a running server beyond atomic file replacement, so
/// two processes refreshing the same series may both fetch the same gap.
pub async fn run(config: AppConfig, once: bool) {
    println!("🔄 Refreshing cached series in {}", config.cache.cache_root.display());

    let provider = match YahooClient::new(&config.provider_base_url, config.cache.request_timeout) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("❌ Failed to create provider client: {}", e);
            std::process::exit(1);
        }
    };
    let cache = Arc::new(HistoryCache::new(config.cache.clone(), Arc::new(provider)));
    let health_stats = Arc::new(RwLock::new(HealthStats::default()));

    if once {
        match worker::run_refresh_once(&cache, &health_stats, 1).await {
            Some(report) => {
                println!("✅ Refresh completed:");
                println!("   📂 Scanned:   {}", report.scanned);
                println!("   📈 Updated:   {}", report.updated);
                println!("   ⏸️  Unchanged: {}", report.unchanged);
                println!("   ⏭️  Skipped:   {}", report.skipped);
                println!("   ❌ Failed:    {}", report.failed);
            }
            None => {
                eprintln!("❌ Refresh failed, see log for details");
                std::process::exit(1);
            }
        }
        return;
    }

    println!(
        "⚡ Refreshing every {} seconds, press Ctrl-C to stop",
        config.cache.refresh_interval.as_secs()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = shutdown_tx.send(true);
    });

    worker::run_refresh_worker(cache, health_stats, shutdown_rx).await;
    println!("👋 Refresher stopped");
}
