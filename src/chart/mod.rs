//! Review aggregation and chart rendering
//!
//! [`summarize`] reduces a review set to bucketed counts; the `render_*`
//! functions turn those counts into PNG images. Rendering holds no shared
//! state, so charts for different products can be drawn concurrently.

mod draw;

pub use draw::*;

use crate::config::ChartConfig;
use crate::error::{Error, Result};
use crate::models::{Recommendation, Review};
use serde::{Deserialize, Serialize};

/// Number of half-star buckets from 0.5 to 5.0 inclusive
pub const STAR_BUCKETS: usize = 10;

/// Review counts per half-star bucket, ascending from 0.5 to 5.0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarsHistogram {
    pub counts: [u32; STAR_BUCKETS],
}

impl StarsHistogram {
    /// Bucket value of the given index (0 -> 0.5, 9 -> 5.0)
    pub fn bucket_value(index: usize) -> f64 {
        (index as f64 + 1.0) * 0.5
    }

    /// Index of the bucket a star score falls into, rounding to the nearest half
    pub fn bucket_index(stars: f64) -> usize {
        let half_steps = (stars * 2.0).round() as i64;
        (half_steps - 1).clamp(0, STAR_BUCKETS as i64 - 1) as usize
    }

    pub fn add(&mut self, stars: f64) {
        self.counts[Self::bucket_index(stars)] += 1;
    }

    /// (bucket value, count) pairs in ascending bucket order
    pub fn buckets(&self) -> impl Iterator<Item = (f64, u32)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, c)| (Self::bucket_value(i), *c))
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Distribution of reviews across recommendation states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSplit {
    pub recommended: u32,
    pub not_recommended: u32,
    pub unspecified: u32,
}

impl RecommendationSplit {
    pub fn add(&mut self, recommendation: Recommendation) {
        match recommendation {
            Recommendation::Recommended => self.recommended += 1,
            Recommendation::NotRecommended => self.not_recommended += 1,
            Recommendation::Unspecified => self.unspecified += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.recommended + self.not_recommended + self.unspecified
    }

    /// Categories in pie order, zero counts included
    pub fn categories(&self) -> [(Recommendation, u32); 3] {
        [
            (Recommendation::Recommended, self.recommended),
            (Recommendation::NotRecommended, self.not_recommended),
            (Recommendation::Unspecified, self.unspecified),
        ]
    }

    /// Whole-number percentages of the non-zero categories only
    pub fn percentages(&self) -> Vec<(Recommendation, f64)> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        self.categories()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(rec, count)| (rec, (count as f64 * 100.0 / total as f64).round()))
            .collect()
    }
}

/// Aggregates for one product's full review set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub stars: StarsHistogram,
    pub recommendations: RecommendationSplit,
}

impl ReviewSummary {
    /// Mean star score, `None` for an empty set
    pub fn average_stars(&self) -> Option<f64> {
        let total = self.stars.total();
        if total == 0 {
            return None;
        }
        let sum: f64 = self.stars.buckets().map(|(v, c)| v * c as f64).sum();
        Some(sum / total as f64)
    }
}

/// Compute the star histogram and recommendation split of a review set
pub fn summarize(reviews: &[Review]) -> ReviewSummary {
    let mut summary = ReviewSummary::default();
    for review in reviews {
        summary.stars.add(review.stars);
        summary.recommendations.add(review.recommendation);
    }
    summary
}

/// PNG images derived from one summary
#[derive(Debug, Clone)]
pub struct RenderedCharts {
    pub stars_png: Vec<u8>,
    pub recommendations_png: Vec<u8>,
}

/// Render both charts on the calling thread
pub fn render(summary: &ReviewSummary, config: &ChartConfig) -> Result<RenderedCharts> {
    Ok(RenderedCharts {
        stars_png: render_stars_chart(&summary.stars, config)?,
        recommendations_png: render_recommendation_chart(&summary.recommendations, config)?,
    })
}

/// Render both charts concurrently on the blocking thread pool
pub async fn render_in_background(
    summary: ReviewSummary,
    config: ChartConfig,
) -> Result<RenderedCharts> {
    let stars_config = config.clone();
    let stars = tokio::task::spawn_blocking(move || render_stars_chart(&summary.stars, &stars_config));
    let recommendations = tokio::task::spawn_blocking(move || {
        render_recommendation_chart(&summary.recommendations, &config)
    });

    let (stars_png, recommendations_png) = futures::future::try_join(stars, recommendations)
        .await
        .map_err(|e| Error::Chart(format!("render task failed: {}", e)))?;

    Ok(RenderedCharts {
        stars_png: stars_png?,
        recommendations_png: recommendations_png?,
    })
}
