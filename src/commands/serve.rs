use crate::models::AppConfig;
use crate::server::{self, AppState};
use crate::services::YahooClient;
use crate::worker;
use std::sync::Arc;
use tokio::sync::watch;

pub async fn run(config: AppConfig, refresh: bool) {
    println!("🚀 Starting finbot server on port {}", config.port);
    println!("📁 Cache directory:     {}", config.cache.cache_root.display());
    println!("📁 Reference data:      {}", config.reference_data_dir.display());
    println!("🌐 Provider:            {}", config.provider_base_url);

    let provider = match YahooClient::new(&config.provider_base_url, config.cache.request_timeout) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("❌ Failed to create provider client: {}", e);
            std::process::exit(1);
        }
    };
    let app_state = AppState::new(&config, Arc::new(provider));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let refresh_handle = if refresh {
        println!(
            "⚡ Spawning refresh worker (every {} seconds)...",
            config.cache.refresh_interval.as_secs()
        );
        Some(tokio::spawn(worker::run_refresh_worker(
            app_state.history.clone(),
            app_state.health_stats.clone(),
            shutdown_rx.clone(),
        )))
    } else {
        println!("⏸️  Refresh worker disabled (--no-refresh)");
        None
    };

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    let shutdown = async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    };

    if let Err(e) = server::serve(app_state, config.port, shutdown).await {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }

    if let Some(handle) = refresh_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Refresh worker panicked");
        }
    }
    println!("👋 Server stopped");
}
