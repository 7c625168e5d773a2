use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::commands;
use crate::error::Result;
use crate::models::AppConfig;

#[derive(Parser)]
#[command(name = "finbot")]
#[command(about = "Market data cache and instrument reference API", long_about = None)]
pub struct Cli {
    /// Directory holding cached series (overrides CACHE_DIR)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Directory holding all_*.json and gics.json (overrides REFERENCE_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server with the scheduled refresher
    Serve {
        /// Listen port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not run the refresher in this process
        #[arg(long)]
        no_refresh: bool,

        /// Refresher period in seconds (overrides REFRESH_INTERVAL_SECS)
        #[arg(long)]
        refresh_interval: Option<u64>,
    },
    /// Run the refresher without the HTTP server
    Refresh {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,

        /// Refresher period in seconds (overrides REFRESH_INTERVAL_SECS)
        #[arg(long)]
        refresh_interval: Option<u64>,
    },
    /// Show cached series
    Status,
}

impl Cli {
    /// Environment configuration with command-line overrides applied
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::from_env()?;

        if let Some(dir) = &self.cache_dir {
            config.cache.cache_root = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.reference_data_dir = dir.clone();
        }

        match &self.command {
            Commands::Serve { port, refresh_interval, .. } => {
                if let Some(port) = port {
                    config.port = *port;
                }
                apply_refresh_interval(&mut config, *refresh_interval)?;
            }
            Commands::Refresh { refresh_interval, .. } => {
                apply_refresh_interval(&mut config, *refresh_interval)?;
            }
            Commands::Status => {}
        }

        Ok(config)
    }
}

fn apply_refresh_interval(config: &mut AppConfig, secs: Option<u64>) -> Result<()> {
    match secs {
        Some(0) => Err(crate::error::AppError::Config(
            "--refresh-interval must be positive".to_string(),
        )),
        Some(secs) => {
            config.cache.refresh_interval = Duration::from_secs(secs);
            Ok(())
        }
        None => Ok(()),
    }
}

pub async fn run() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve { no_refresh, .. } => {
            commands::serve::run(config, !no_refresh).await;
        }
        Commands::Refresh { once, .. } => {
            commands::refresh::run(config, once).await;
        }
        Commands::Status => {
            commands::status::run(config);
        }
    }
}
