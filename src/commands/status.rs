//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{GlobalStats, ReviewDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub base_url: String,
    pub max_pages: u32,
    pub overall_timeout_secs: u64,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &ReviewDb) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = db.get_global_stats().await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        base_url: config.scrape.base_url.clone(),
        max_pages: config.scrape.max_pages,
        overall_timeout_secs: config.scrape.overall_timeout_secs,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 opinion-miner Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nScraping:");
    println!("  Site: {}", status.base_url);
    println!("  Page ceiling: {}", status.max_pages);
    println!("  Run timeout: {}s", status.overall_timeout_secs);
    println!("\nDatabase Stats:");
    println!("  Users: {}", status.db_stats.user_count);
    println!("  Products: {}", status.db_stats.product_count);
    println!("  Reviews: {}", status.db_stats.review_count);
    println!("  Extraction runs: {}", status.db_stats.run_count);
}
