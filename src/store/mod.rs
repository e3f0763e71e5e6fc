//! Review storage using SQLite
//!
//! This module handles all persistent state:
//! - Users and their product links
//! - Products with their rendered charts
//! - Reviews (upserted by id)
//! - Extraction runs (history and stats)

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ExportedReview, Product, Recommendation, Review};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Extraction run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::Config(format!("Unknown run status: {}", s))),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

/// A stored product row
#[derive(Debug, Clone, FromRow)]
pub struct StoredProduct {
    pub id: String,
    pub stars_chart: Vec<u8>,
    pub recommendations_chart: Vec<u8>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
struct ReviewRow {
    id: String,
    product_id: String,
    recommendation: Option<bool>,
    stars: f64,
    pros: String,
    cons: String,
    content: String,
    author: Option<String>,
    upvote_count: i64,
    downvote_count: i64,
    posted_at: Option<String>,
    purchased_at: Option<String>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            product_id: row.product_id,
            recommendation: Recommendation::from_flag(row.recommendation),
            stars: row.stars,
            pros: row.pros,
            cons: row.cons,
            content: row.content,
            author: row.author,
            upvote_count: row.upvote_count,
            downvote_count: row.downvote_count,
            posted_at: row.posted_at,
            purchased_at: row.purchased_at,
        }
    }
}

/// An extraction run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub id: String,
    pub product_id: String,
    pub user_id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub pages_fetched: i64,
    pub reviews_extracted: i64,
    pub error: Option<String>,
}

/// Per-product stats for a user's product list
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub opinion_count: i64,
    pub average_stars: Option<f64>,
    pub pros_count: i64,
    pub cons_count: i64,
}

/// Outcome of one upsert transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    pub product_created: bool,
    pub reviews_inserted: usize,
    pub reviews_updated: usize,
    pub link_created: bool,
}

/// Read-side filter over a product's reviews
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    /// Case-insensitive substring of the review id
    pub id: Option<String>,
    /// Case-insensitive substring of the pros list
    pub pros: Option<String>,
    /// Case-insensitive substring of the cons list
    pub cons: Option<String>,
    pub only_recommended: bool,
    pub only_not_recommended: bool,
    pub stars_min: Option<f64>,
    pub stars_max: Option<f64>,
}

impl ReviewFilter {
    /// Recommendation value to filter on; selecting both flags means no filter
    fn recommendation(&self) -> Option<bool> {
        match (self.only_recommended, self.only_not_recommended) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }

    fn matches_text(&self, review: &Review) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle {
                Some(n) if !n.is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
                _ => true,
            }
        }
        contains(&review.id, &self.id)
            && contains(&review.pros, &self.pros)
            && contains(&review.cons, &self.cons)
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub user_count: usize,
    pub product_count: usize,
    pub review_count: usize,
    pub run_count: usize,
}

/// Review database handle
#[derive(Clone)]
pub struct ReviewDb {
    pool: SqlitePool,
    /// Serializes upsert transactions issued through this handle
    write_lock: Arc<Mutex<()>>,
}

impl ReviewDb {
    /// Connect using the configured database path and ensure the schema exists
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Create database with path directly (without full config)
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='reviews'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== User Operations =====

    /// Register a new user
    pub async fn create_user(&self, username: &str, email: &str) -> Result<User> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query("INSERT INTO users (username, email, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind(&created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    Error::UserExists(username.to_string())
                }
                other => Error::Database(other),
            })?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            created_at,
        })
    }

    /// Get user by username
    pub async fn get_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get user by username, failing when absent
    pub async fn require_user(&self, username: &str) -> Result<User> {
        self.get_user_by_name(username)
            .await?
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    // ===== Upsert =====

    /// Replace-or-insert the product and its reviews, then link the product
    /// to the user. Everything commits together or not at all; any failure
    /// surfaces as [`Error::StorageConflict`].
    ///
    /// Reviews stored earlier whose ids are absent from `reviews` are kept.
    pub async fn upsert_extraction(
        &self,
        product: &Product,
        reviews: &[Review],
        user_id: i64,
    ) -> Result<UpsertStats> {
        let _guard = self.write_lock.lock().await;

        let result = async {
            let mut tx = self.pool.begin().await?;
            let stats = write_extraction(&mut tx, product, reviews, user_id).await?;
            tx.commit().await?;
            Ok::<_, Error>(stats)
        }
        .await;

        match result {
            Ok(stats) => {
                debug!(
                    "Upserted product {}: {} inserted, {} updated",
                    product.id, stats.reviews_inserted, stats.reviews_updated
                );
                Ok(stats)
            }
            Err(Error::Database(e)) => Err(Error::StorageConflict(e.to_string())),
            Err(other) => Err(other),
        }
    }

    // ===== Product Operations =====

    /// Get product by ID
    pub async fn get_product(&self, id: &str) -> Result<Option<StoredProduct>> {
        let product = sqlx::query_as::<_, StoredProduct>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Whether the user has a link to the product
    pub async fn is_user_linked(&self, user_id: i64, product_id: &str) -> Result<bool> {
        let link: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM user_products WHERE user_id = ? AND product_id = ?",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link.is_some())
    }

    /// Number of links for a product (one per user at most)
    pub async fn count_links(&self, product_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_products WHERE product_id = ?")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Products linked to a user, with review stats
    pub async fn list_user_products(&self, user_id: i64) -> Result<Vec<ProductSummary>> {
        let mut products = sqlx::query_as::<_, ProductSummary>(
            r#"
            SELECT p.id AS id,
                   COUNT(r.id) AS opinion_count,
                   AVG(r.stars) AS average_stars,
                   COUNT(NULLIF(r.pros, '')) AS pros_count,
                   COUNT(NULLIF(r.cons, '')) AS cons_count
            FROM user_products up
            JOIN products p ON p.id = up.product_id
            LEFT JOIN reviews r ON r.product_id = p.id
            WHERE up.user_id = ?
            GROUP BY p.id
            ORDER BY p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for product in &mut products {
            product.average_stars = product.average_stars.map(|a| (a * 100.0).round() / 100.0);
        }
        Ok(products)
    }

    // ===== Review Operations =====

    /// All reviews of a product in extraction order
    pub async fn list_reviews(&self, product_id: &str) -> Result<Vec<Review>> {
        self.query_reviews(product_id, &ReviewFilter::default()).await
    }

    /// Reviews of a product matching the filter
    pub async fn query_reviews(&self, product_id: &str, filter: &ReviewFilter) -> Result<Vec<Review>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, product_id, recommendation, stars, pros, cons, content, author, \
             upvote_count, downvote_count, posted_at, purchased_at FROM reviews WHERE product_id = ",
        );
        builder.push_bind(product_id);

        if let Some(flag) = filter.recommendation() {
            builder.push(" AND recommendation = ");
            builder.push_bind(flag);
        }
        if let Some(min) = filter.stars_min {
            builder.push(" AND stars >= ");
            builder.push_bind(min);
        }
        if let Some(max) = filter.stars_max {
            builder.push(" AND stars <= ");
            builder.push_bind(max);
        }
        builder.push(" ORDER BY rowid");

        let rows: Vec<ReviewRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        // Substring matching happens here so it is case-insensitive beyond ASCII
        Ok(rows
            .into_iter()
            .map(Review::from)
            .filter(|r| filter.matches_text(r))
            .collect())
    }

    /// Reviews of a product in the stable export shape
    pub async fn export_reviews(&self, product_id: &str) -> Result<Vec<ExportedReview>> {
        let reviews = self.list_reviews(product_id).await?;
        Ok(reviews.iter().map(ExportedReview::from).collect())
    }

    // ===== Extraction Run Operations =====

    /// Start a new extraction run
    pub async fn start_run(&self, product_id: &str, user_id: i64) -> Result<ExtractionRun> {
        let run = ExtractionRun {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            user_id,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            pages_fetched: 0,
            reviews_extracted: 0,
            error: None,
        };
        sqlx::query(
            r#"
            INSERT INTO extraction_runs (id, product_id, user_id, started_at, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.product_id)
        .bind(run.user_id)
        .bind(&run.started_at)
        .bind(&run.status)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    /// Complete an extraction run
    pub async fn complete_run(
        &self,
        id: &str,
        status: RunStatus,
        pages_fetched: u32,
        reviews_extracted: usize,
        error: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE extraction_runs SET
                completed_at = ?,
                status = ?,
                pages_fetched = ?,
                reviews_extracted = ?,
                error = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(pages_fetched as i64)
        .bind(reviews_extracted as i64)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get latest extraction run for a product
    pub async fn get_latest_run(&self, product_id: &str) -> Result<Option<ExtractionRun>> {
        let run = sqlx::query_as::<_, ExtractionRun>(
            "SELECT * FROM extraction_runs WHERE product_id = ? ORDER BY started_at DESC LIMIT 1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let user_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let product_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        let review_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews")
            .fetch_one(&self.pool)
            .await?;
        let run_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM extraction_runs")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            user_count: user_count.0 as usize,
            product_count: product_count.0 as usize,
            review_count: review_count.0 as usize,
            run_count: run_count.0 as usize,
        })
    }
}

async fn write_extraction(
    conn: &mut SqliteConnection,
    product: &Product,
    reviews: &[Review],
    user_id: i64,
) -> Result<UpsertStats> {
    let now = Utc::now().to_rfc3339();
    let mut stats = UpsertStats::default();

    let product_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?")
        .bind(&product.id)
        .fetch_optional(&mut *conn)
        .await?;

    if product_exists.is_some() {
        sqlx::query(
            "UPDATE products SET stars_chart = ?, recommendations_chart = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&product.stars_chart)
        .bind(&product.recommendations_chart)
        .bind(&now)
        .bind(&product.id)
        .execute(&mut *conn)
        .await?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO products (id, stars_chart, recommendations_chart, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.stars_chart)
        .bind(&product.recommendations_chart)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;
        stats.product_created = true;
    }

    for review in reviews {
        let review_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM reviews WHERE id = ?")
            .bind(&review.id)
            .fetch_optional(&mut *conn)
            .await?;

        if review_exists.is_some() {
            sqlx::query(
                r#"
                UPDATE reviews SET
                    product_id = ?, recommendation = ?, stars = ?, pros = ?, cons = ?,
                    content = ?, author = ?, upvote_count = ?, downvote_count = ?,
                    posted_at = ?, purchased_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&review.product_id)
            .bind(review.recommendation.as_flag())
            .bind(review.stars)
            .bind(&review.pros)
            .bind(&review.cons)
            .bind(&review.content)
            .bind(&review.author)
            .bind(review.upvote_count)
            .bind(review.downvote_count)
            .bind(&review.posted_at)
            .bind(&review.purchased_at)
            .bind(&now)
            .bind(&review.id)
            .execute(&mut *conn)
            .await?;
            stats.reviews_updated += 1;
        } else {
            sqlx::query(
                r#"
                INSERT INTO reviews (id, product_id, recommendation, stars, pros, cons, content,
                    author, upvote_count, downvote_count, posted_at, purchased_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&review.id)
            .bind(&review.product_id)
            .bind(review.recommendation.as_flag())
            .bind(review.stars)
            .bind(&review.pros)
            .bind(&review.cons)
            .bind(&review.content)
            .bind(&review.author)
            .bind(review.upvote_count)
            .bind(review.downvote_count)
            .bind(&review.posted_at)
            .bind(&review.purchased_at)
            .bind(&now)
            .execute(&mut *conn)
            .await?;
            stats.reviews_inserted += 1;
        }
    }

    let link_exists: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM user_products WHERE user_id = ? AND product_id = ?")
            .bind(user_id)
            .bind(&product.id)
            .fetch_optional(&mut *conn)
            .await?;

    if link_exists.is_none() {
        sqlx::query("INSERT INTO user_products (user_id, product_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&product.id)
            .bind(&now)
            .execute(&mut *conn)
            .await?;
        stats.link_created = true;
    }

    Ok(stats)
}
