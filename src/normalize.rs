//! Coercion of raw review fields into typed values

use crate::error::{Error, Result};
use crate::models::{Recommendation, Review};
use crate::parse::{collapse_whitespace, RawReview};

const MIN_STARS: f64 = 0.5;
const MAX_STARS: f64 = 5.0;

/// Turn one raw review block into a typed [`Review`].
///
/// Fails with [`Error::MalformedRecord`] when the id or the star score is
/// missing or unparseable, or when a vote count is not an integer.
pub fn normalize(raw: RawReview, product_id: &str) -> Result<Review> {
    let id = match raw.id {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(Error::MalformedRecord(
                "review block has no entry id".to_string(),
            ))
        }
    };

    let stars = match raw.stars.as_deref() {
        Some(text) => parse_stars(text).map_err(|e| with_id(e, &id))?,
        None => {
            return Err(Error::MalformedRecord(format!(
                "review {} has no star score",
                id
            )))
        }
    };

    let upvote_count = parse_vote_count(raw.upvote.as_deref()).map_err(|e| with_id(e, &id))?;
    let downvote_count =
        parse_vote_count(raw.downvote.as_deref()).map_err(|e| with_id(e, &id))?;

    Ok(Review {
        recommendation: Recommendation::from_keyword(raw.recommendation.as_deref()),
        stars,
        pros: raw.pros.unwrap_or_default(),
        cons: raw.cons.unwrap_or_default(),
        content: raw
            .content
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default(),
        author: raw.author,
        upvote_count,
        downvote_count,
        posted_at: raw.posted,
        purchased_at: raw.purchased,
        product_id: product_id.to_string(),
        id,
    })
}

fn with_id(err: Error, id: &str) -> Error {
    match err {
        Error::MalformedRecord(msg) => Error::MalformedRecord(format!("review {}: {}", id, msg)),
        other => other,
    }
}

/// Parse "N/5"-style score text, accepting a decimal comma ("4,5/5" -> 4.5)
pub fn parse_stars(text: &str) -> Result<f64> {
    let (numerator, _) = text
        .split_once('/')
        .ok_or_else(|| Error::MalformedRecord(format!("star score '{}' has no '/'", text)))?;

    let value: f64 = numerator
        .trim()
        .replace(',', ".")
        .parse()
        .map_err(|_| Error::MalformedRecord(format!("star score '{}' is not a number", text)))?;

    if !(MIN_STARS..=MAX_STARS).contains(&value) {
        return Err(Error::MalformedRecord(format!(
            "star score '{}' outside {}..={}",
            text, MIN_STARS, MAX_STARS
        )));
    }

    Ok(value)
}

/// Parse a vote counter attribute; an absent attribute counts as "0"
pub fn parse_vote_count(text: Option<&str>) -> Result<i64> {
    let text = text.unwrap_or("0");
    text.trim()
        .parse()
        .map_err(|_| Error::MalformedRecord(format!("vote count '{}' is not an integer", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, stars: &str) -> RawReview {
        RawReview {
            id: Some(id.to_string()),
            stars: Some(stars.to_string()),
            upvote: Some("4".to_string()),
            downvote: Some("1".to_string()),
            ..RawReview::default()
        }
    }

    #[test]
    fn test_parse_stars_separators() {
        assert_eq!(parse_stars("4,5/5").unwrap(), 4.5);
        assert_eq!(parse_stars("4.5/5").unwrap(), 4.5);
        assert_eq!(parse_stars("5/5").unwrap(), 5.0);
        assert_eq!(parse_stars("0,5/5").unwrap(), 0.5);
        assert_eq!(parse_stars(" 3 / 5").unwrap(), 3.0);
    }

    #[test]
    fn test_parse_stars_every_half_step() {
        for step in 1..=10 {
            let value = step as f64 * 0.5;
            let comma = format!("{}/5", value).replace('.', ",");
            assert_eq!(parse_stars(&comma).unwrap(), value);
            assert_eq!(parse_stars(&format!("{}/5", value)).unwrap(), value);
        }
    }

    #[test]
    fn test_parse_stars_malformed() {
        assert!(matches!(parse_stars("4,5"), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_stars("abc/5"), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_stars("/5"), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_stars("7/5"), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_stars("0/5"), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_parse_vote_count() {
        assert_eq!(parse_vote_count(Some("12")).unwrap(), 12);
        assert_eq!(parse_vote_count(None).unwrap(), 0);
        assert!(parse_vote_count(Some("12a")).is_err());
        assert!(parse_vote_count(Some("")).is_err());
    }

    #[test]
    fn test_normalize_full_record() {
        let mut record = raw("55", "3,5/5");
        record.recommendation = Some("Nie polecam".to_string());
        record.content = Some("  Too\n\nloud   overall ".to_string());
        record.pros = Some("cheap, small".to_string());
        record.author = Some("Jan".to_string());
        record.posted = Some("2024-01-02 03:04:05".to_string());

        let review = normalize(record, "900").unwrap();
        assert_eq!(review.id, "55");
        assert_eq!(review.product_id, "900");
        assert_eq!(review.stars, 3.5);
        assert_eq!(review.recommendation, Recommendation::NotRecommended);
        assert_eq!(review.content, "Too loud overall");
        assert_eq!(review.pros, "cheap, small");
        assert_eq!(review.cons, "");
        assert_eq!(review.author.as_deref(), Some("Jan"));
        assert_eq!(review.upvote_count, 4);
        assert_eq!(review.downvote_count, 1);
        assert_eq!(review.posted_at.as_deref(), Some("2024-01-02 03:04:05"));
        assert!(review.purchased_at.is_none());
    }

    #[test]
    fn test_normalize_unknown_recommendation_never_fails() {
        let mut record = raw("1", "2/5");
        record.recommendation = Some("Neutralnie".to_string());
        let review = normalize(record, "1").unwrap();
        assert_eq!(review.recommendation, Recommendation::Unspecified);
    }

    #[test]
    fn test_normalize_missing_votes_default_to_zero() {
        let mut record = raw("1", "2/5");
        record.upvote = None;
        record.downvote = None;
        let review = normalize(record, "1").unwrap();
        assert_eq!(review.upvote_count, 0);
        assert_eq!(review.downvote_count, 0);
    }

    #[test]
    fn test_normalize_required_fields() {
        let mut record = raw("1", "2/5");
        record.stars = None;
        assert!(matches!(normalize(record, "1"), Err(Error::MalformedRecord(_))));

        let mut record = raw("1", "2/5");
        record.id = None;
        assert!(matches!(normalize(record, "1"), Err(Error::MalformedRecord(_))));

        let record = raw("1", "two/5");
        let err = normalize(record, "1").unwrap_err();
        assert!(err.to_string().contains("review 1"));
    }
}
