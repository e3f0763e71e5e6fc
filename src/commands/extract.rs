//! Extract command implementation
//!
//! Scrapes every review page of a product, renders the charts and writes
//! everything in one transaction. The run is recorded either way.

use crate::chart::{render_in_background, summarize};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{validate_product_code, CancelToken, Extractor};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::models::{Product, Recommendation};
use crate::parse::ReviewParser;
use crate::progress::{page_spinner, report_page};
use crate::store::{ReviewDb, RunStatus, UpsertStats};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{info, warn};

/// Extract command statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractStats {
    pub product_id: String,
    pub run_id: String,
    pub pages_fetched: u32,
    pub reviews_extracted: usize,
    pub average_stars: Option<f64>,
    /// Whole-number shares of the non-zero recommendation categories
    pub recommendation_percentages: Vec<(Recommendation, f64)>,
    pub upsert: UpsertStats,
}

/// Extract a product's reviews over HTTP on behalf of a user
pub async fn cmd_extract(
    config: &Config,
    db: &ReviewDb,
    username: &str,
    product_code: &str,
    cancel: &CancelToken,
) -> Result<ExtractStats> {
    let fetcher = HttpFetcher::new(&config.scrape)?;
    extract_with_fetcher(config, db, fetcher, username, product_code, cancel).await
}

/// Extract using any page source
pub async fn extract_with_fetcher<F: PageFetcher>(
    config: &Config,
    db: &ReviewDb,
    fetcher: F,
    username: &str,
    product_code: &str,
    cancel: &CancelToken,
) -> Result<ExtractStats> {
    let user = db.require_user(username).await?;
    validate_product_code(product_code)?;

    let parser = ReviewParser::new(&config.scrape.base_url)?;
    let extractor = Extractor::new(fetcher, parser, &config.scrape);

    let run = db.start_run(product_code, user.id).await?;
    info!("Starting extraction of product {} for {}", product_code, user.username);

    let pages = AtomicU32::new(0);
    let spinner = page_spinner(product_code);

    let result = async {
        let extraction = extractor
            .extract_with_progress(product_code, cancel, |progress| {
                pages.store(progress.pages_fetched, Ordering::Relaxed);
                report_page(&spinner, progress);
            })
            .await?;

        spinner.set_message("rendering charts");
        let summary = summarize(&extraction.reviews);
        let charts = render_in_background(summary, config.charts.clone()).await?;

        spinner.set_message("saving");
        let product = Product {
            id: extraction.product_id.clone(),
            stars_chart: charts.stars_png,
            recommendations_chart: charts.recommendations_png,
        };
        let upsert = db
            .upsert_extraction(&product, &extraction.reviews, user.id)
            .await?;

        Ok::<_, Error>(ExtractStats {
            product_id: extraction.product_id,
            run_id: run.id.clone(),
            pages_fetched: extraction.pages_fetched,
            reviews_extracted: extraction.reviews.len(),
            average_stars: summary.average_stars(),
            recommendation_percentages: summary.recommendations.percentages(),
            upsert,
        })
    }
    .await;

    spinner.finish_and_clear();

    // Run history is bookkeeping: its failures are logged, never returned
    match result {
        Ok(stats) => {
            if let Err(record_err) = db
                .complete_run(
                    &run.id,
                    RunStatus::Completed,
                    stats.pages_fetched,
                    stats.reviews_extracted,
                    None,
                )
                .await
            {
                warn!("Could not record run {}: {}", run.id, record_err);
            }
            Ok(stats)
        }
        Err(e) => {
            warn!("Extraction of product {} failed: {}", product_code, e);
            if let Err(record_err) = db
                .complete_run(
                    &run.id,
                    RunStatus::Failed,
                    pages.load(Ordering::Relaxed),
                    0,
                    Some(e.to_string()),
                )
                .await
            {
                warn!("Could not record failed run {}: {}", run.id, record_err);
            }
            Err(e)
        }
    }
}

/// Print extraction summary
pub fn print_extract_stats(stats: &ExtractStats) {
    println!("\n✓ Extracted product {}", stats.product_id);
    println!("  Pages fetched: {}", stats.pages_fetched);
    println!("  Reviews: {}", stats.reviews_extracted);
    println!(
        "  Stored: {} new, {} updated",
        stats.upsert.reviews_inserted, stats.upsert.reviews_updated
    );
    if let Some(avg) = stats.average_stars {
        println!("  Average stars: {:.2}", avg);
    }
    if !stats.recommendation_percentages.is_empty() {
        let shares: Vec<String> = stats
            .recommendation_percentages
            .iter()
            .map(|(rec, pct)| format!("{} {}%", rec, pct))
            .collect();
        println!("  Recommendations: {}", shares.join(", "));
    }
    if stats.upsert.link_created {
        println!("  Product added to your list");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct OnePage(String);

    #[async_trait]
    impl PageFetcher for OnePage {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    /// Serves one page, then drops the link and run tables behind the store's back
    struct SabotagingFetcher {
        page: String,
        db_url: String,
    }

    #[async_trait]
    impl PageFetcher for SabotagingFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            let pool = sqlx::SqlitePool::connect(&self.db_url).await?;
            sqlx::query("DROP TABLE user_products")
                .execute(&pool)
                .await?;
            sqlx::query("DROP TABLE extraction_runs")
                .execute(&pool)
                .await?;
            pool.close().await;
            Ok(self.page.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl PageFetcher for Broken {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(Error::HttpStatus {
                code: 503,
                url: url.to_string(),
            })
        }
    }

    async fn setup() -> (Config, ReviewDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.scrape.base_url = "https://reviews.test".to_string();
        config.charts.width = 200;
        config.charts.height = 150;
        config.paths.db_file = tmp.path().join("test.db");
        let db = ReviewDb::connect(&config).await.unwrap();
        db.create_user("anna", "anna@example.com").await.unwrap();
        (config, db, tmp)
    }

    const PAGE: &str = r#"<html><body>
        <div class="js_product-review" data-entry-id="11">
          <span class="user-post__author-recomendation"><em>Polecam</em></span>
          <span class="user-post__score-count">4,5/5</span>
          <div class="user-post__text">Solid.</div>
        </div>
        </body></html>"#;

    #[tokio::test]
    async fn test_extract_records_completed_run() {
        let (config, db, _tmp) = setup().await;
        let stats = extract_with_fetcher(
            &config,
            &db,
            OnePage(PAGE.to_string()),
            "anna",
            "77",
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.reviews_extracted, 1);
        assert_eq!(stats.average_stars, Some(4.5));
        assert_eq!(
            stats.recommendation_percentages,
            vec![(Recommendation::Recommended, 100.0)]
        );
        assert!(stats.upsert.link_created);

        let product = db.get_product("77").await.unwrap().unwrap();
        assert!(product.stars_chart.starts_with(b"\x89PNG"));

        let run = db.get_latest_run("77").await.unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.reviews_extracted, 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_writes_nothing() {
        let (config, db, _tmp) = setup().await;
        let err = extract_with_fetcher(&config, &db, Broken, "anna", "77", &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.is_extraction_failure());
        assert!(db.get_product("77").await.unwrap().is_none());
        let run = db.get_latest_run("77").await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert!(run.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_storage_failure_survives_bookkeeping_failure() {
        let (config, db, _tmp) = setup().await;
        let fetcher = SabotagingFetcher {
            page: PAGE.to_string(),
            db_url: format!("sqlite://{}", config.paths.db_file.display()),
        };

        let err = extract_with_fetcher(&config, &db, fetcher, "anna", "77", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageConflict(_)));
        assert!(db.get_product("77").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected_before_fetching() {
        let (config, db, _tmp) = setup().await;
        let err = extract_with_fetcher(&config, &db, Broken, "ghost", "77", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
        assert!(db.get_latest_run("77").await.unwrap().is_none());
    }
}
