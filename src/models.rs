//! Core review and product types shared by the pipeline and the store.

use serde::{Deserialize, Serialize};

/// Keyword the site prints for a positive recommendation
pub const RECOMMEND_KEYWORD: &str = "Polecam";
/// Keyword the site prints for a negative recommendation
pub const NOT_RECOMMEND_KEYWORD: &str = "Nie polecam";

/// Tri-state reviewer recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Recommended,
    NotRecommended,
    Unspecified,
}

impl Recommendation {
    /// Map the site's keyword to a recommendation. Total: unknown text is `Unspecified`.
    pub fn from_keyword(keyword: Option<&str>) -> Self {
        match keyword {
            Some(RECOMMEND_KEYWORD) => Recommendation::Recommended,
            Some(NOT_RECOMMEND_KEYWORD) => Recommendation::NotRecommended,
            _ => Recommendation::Unspecified,
        }
    }

    /// Nullable boolean form used for storage and export
    pub fn as_flag(self) -> Option<bool> {
        match self {
            Recommendation::Recommended => Some(true),
            Recommendation::NotRecommended => Some(false),
            Recommendation::Unspecified => None,
        }
    }

    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Recommendation::Recommended,
            Some(false) => Recommendation::NotRecommended,
            None => Recommendation::Unspecified,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Recommended => write!(f, "recommended"),
            Recommendation::NotRecommended => write!(f, "not recommended"),
            Recommendation::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// One normalized review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub recommendation: Recommendation,
    pub stars: f64,
    pub pros: String,
    pub cons: String,
    pub content: String,
    pub author: Option<String>,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub posted_at: Option<String>,
    pub purchased_at: Option<String>,
}

/// A product with the charts rendered for its latest extraction
#[derive(Debug, Clone)]
pub struct Product {
    pub id: String,
    pub stars_chart: Vec<u8>,
    pub recommendations_chart: Vec<u8>,
}

/// Stable export shape for the JSON download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedReview {
    pub id: String,
    pub product_id: String,
    pub recommendation: Option<bool>,
    pub stars: f64,
    pub pros: String,
    pub cons: String,
}

impl From<&Review> for ExportedReview {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id.clone(),
            product_id: review.product_id.clone(),
            recommendation: review.recommendation.as_flag(),
            stars: review.stars,
            pros: review.pros.clone(),
            cons: review.cons.clone(),
        }
    }
}
