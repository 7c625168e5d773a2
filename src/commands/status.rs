use crate::models::AppConfig;
use crate::services::SeriesStore;

pub fn run(config: AppConfig) {
    println!("📊 Cache Status\n");

    if let Err(e) = show_status(&config) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn show_status(config: &AppConfig) -> crate::error::Result<()> {
    let store = SeriesStore::new(config.cache.cache_root.clone());
    let summaries = store.summaries()?;

    if summaries.is_empty() {
        println!("⚠️  No cached series in {}", store.root().display());
        println!("   Series are created on the first /history request.");
        return Ok(());
    }

    println!("📁 {}\n", store.root().display());
    println!("{:<16} {:>5} {:>10}  {:<19} → {:<19}", "SYMBOL", "INT", "BARS", "FIRST", "LATEST");

    for summary in &summaries {
        if !summary.readable {
            println!("{:<16} {:>5} {:>10}  ⚠️  unreadable, will be rebuilt on next read", summary.symbol, summary.interval, "-");
            continue;
        }
        println!(
            "{:<16} {:>5} {:>10}  {:<19} → {:<19}",
            summary.symbol,
            summary.interval,
            summary.bars,
            summary.first.as_deref().unwrap_or("-"),
            summary.latest.as_deref().unwrap_or("-"),
        );
    }

    let total_bars: usize = summaries.iter().map(|s| s.bars).sum();
    println!("\n📈 {} series, {} bars", summaries.len(), total_bars);
    Ok(())
}
