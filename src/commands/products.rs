//! Read-side commands over stored products

use crate::error::{Error, Result};
use crate::models::{ExportedReview, Review};
use crate::store::{ProductSummary, ReviewDb, ReviewFilter, StoredProduct, User};
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolve the user and make sure they may see the product
async fn authorize(db: &ReviewDb, username: &str, product_id: &str) -> Result<User> {
    let user = db.require_user(username).await?;
    if db.get_product(product_id).await?.is_none() {
        return Err(Error::ProductNotFound(product_id.to_string()));
    }
    if !db.is_user_linked(user.id, product_id).await? {
        return Err(Error::AccessDenied {
            user: user.username,
            product: product_id.to_string(),
        });
    }
    Ok(user)
}

/// Products on a user's list with their review stats
pub async fn cmd_products(db: &ReviewDb, username: &str) -> Result<Vec<ProductSummary>> {
    let user = db.require_user(username).await?;
    db.list_user_products(user.id).await
}

/// Filtered reviews of a product
pub async fn cmd_reviews(
    db: &ReviewDb,
    username: &str,
    product_id: &str,
    filter: &ReviewFilter,
) -> Result<Vec<Review>> {
    authorize(db, username, product_id).await?;
    db.query_reviews(product_id, filter).await
}

/// Default export file name for a product
pub fn export_file_name(product_id: &str) -> String {
    format!("product_{}.json", product_id)
}

/// Write a product's reviews as a pretty JSON array
pub async fn cmd_export(
    db: &ReviewDb,
    username: &str,
    product_id: &str,
    output: Option<PathBuf>,
) -> Result<(PathBuf, usize)> {
    authorize(db, username, product_id).await?;
    let reviews: Vec<ExportedReview> = db.export_reviews(product_id).await?;

    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(product_id)));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&reviews)?)?;
    info!("Exported {} reviews to {:?}", reviews.len(), path);

    Ok((path, reviews.len()))
}

/// Chart file paths for a product inside a directory
pub fn chart_paths(dir: &Path, product_id: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}_stars.png", product_id)),
        dir.join(format!("{}_rcmds.png", product_id)),
    )
}

/// Write the stored chart images of a product
pub async fn cmd_charts(
    db: &ReviewDb,
    username: &str,
    product_id: &str,
    out_dir: Option<PathBuf>,
) -> Result<(PathBuf, PathBuf)> {
    authorize(db, username, product_id).await?;
    let product: StoredProduct = db
        .get_product(product_id)
        .await?
        .ok_or_else(|| Error::ProductNotFound(product_id.to_string()))?;

    let dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    let (stars, recommendations) = chart_paths(&dir, product_id);
    std::fs::write(&stars, &product.stars_chart)?;
    std::fs::write(&recommendations, &product.recommendations_chart)?;
    info!("Wrote charts for product {} to {:?}", product_id, dir);

    Ok((stars, recommendations))
}

pub fn print_products(products: &[ProductSummary]) {
    println!("\n📦 Products\n");
    if products.is_empty() {
        println!("No products yet. Use 'opinion-miner extract <code>' to add one.");
        return;
    }
    for product in products {
        let avg = product
            .average_stars
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        println!("• {}", product.id);
        println!(
            "  Opinions: {}, Avg stars: {}, With pros: {}, With cons: {}",
            product.opinion_count, avg, product.pros_count, product.cons_count
        );
    }
}

pub fn print_reviews(reviews: &[Review]) {
    if reviews.is_empty() {
        println!("No matching reviews.");
        return;
    }
    for review in reviews {
        println!(
            "[{}] {} stars, {}{}",
            review.id,
            review.stars,
            review.recommendation,
            review
                .author
                .as_deref()
                .map(|a| format!(", by {}", a))
                .unwrap_or_default()
        );
        if !review.pros.is_empty() {
            println!("  + {}", review.pros);
        }
        if !review.cons.is_empty() {
            println!("  - {}", review.cons);
        }
        if !review.content.is_empty() {
            println!("  {}", review.content);
        }
        println!(
            "  👍 {} 👎 {}",
            review.upvote_count, review.downvote_count
        );
    }
    println!("\n{} reviews", reviews.len());
}
