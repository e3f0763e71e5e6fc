//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::ReviewDb;
use std::path::PathBuf;
use tracing::info;

/// Write the default configuration and create the database schema
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let base = base_dir.unwrap_or_else(Config::default_base_dir);
    let mut config = Config::default();
    config.paths.config_file = base.join("config.toml");
    config.paths.db_file = base.join("reviews.db");
    config.paths.base_dir = base;

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.validate()?;
    config.save()?;

    // Schema creation is idempotent, so existing data survives --force
    let db = ReviewDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}

/// Print init summary
pub fn print_init(config: &Config) {
    println!("✓ Initialized opinion-miner at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("\nNext steps:");
    println!("  opinion-miner user add <name> <email>          # Register a user");
    println!("  opinion-miner extract <product-code> --user <name>  # Scrape reviews");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let config = cmd_init(Some(tmp.path().to_path_buf()), false)
            .await
            .unwrap();

        assert!(config.paths.config_file.exists());
        assert!(config.paths.db_file.exists());
        assert!(config.is_initialized());
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        cmd_init(Some(tmp.path().to_path_buf()), false)
            .await
            .unwrap();

        let err = cmd_init(Some(tmp.path().to_path_buf()), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        cmd_init(Some(tmp.path().to_path_buf()), true).await.unwrap();
    }
}
