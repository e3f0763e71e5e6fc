//! Review block and pagination extraction

use super::{ParsedPage, RawReview};
use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

const REVIEW_BLOCK: &str = "div.js_product-review";
const NEXT_PAGE_LINK: &str = "a.pagination__next";

/// Named fields of a review block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewField {
    Id,
    Author,
    Recommendation,
    Stars,
    Content,
    Pros,
    Cons,
    Upvote,
    Downvote,
    Posted,
    Purchased,
}

/// How a single field is pulled out of a review block
#[derive(Debug, Clone)]
enum FieldRule {
    /// Attribute on the review block itself
    BlockAttr(&'static str),
    /// Trimmed inner text of the first match
    Text(Selector),
    /// Trimmed attribute of the first match
    Attr(Selector, &'static str),
    /// Trimmed texts of all matches joined with ", "
    JoinedText(Selector),
}

impl FieldRule {
    fn extract(&self, block: ElementRef<'_>) -> Option<String> {
        match self {
            FieldRule::BlockAttr(attr) => block.value().attr(attr).map(|v| v.trim().to_string()),
            FieldRule::Text(selector) => block
                .select(selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string()),
            FieldRule::Attr(selector, attr) => block
                .select(selector)
                .next()
                .and_then(|e| e.value().attr(attr))
                .map(|v| v.trim().to_string()),
            FieldRule::JoinedText(selector) => Some(
                block
                    .select(selector)
                    .map(|e| e.text().collect::<String>().trim().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("invalid selector '{}': {}", css, e)))
}

/// Parser for one page of product reviews
#[derive(Debug, Clone)]
pub struct ReviewParser {
    base_url: Url,
    block: Selector,
    next_page: Selector,
    fields: Vec<(ReviewField, FieldRule)>,
}

impl ReviewParser {
    /// Compile all selectors. `base_url` resolves relative "next page" links.
    pub fn new(base_url: &str) -> Result<Self> {
        let text = |css: &str| selector(css).map(FieldRule::Text);
        let attr = |css: &str, name: &'static str| selector(css).map(|s| FieldRule::Attr(s, name));
        let joined = |css: &str| selector(css).map(FieldRule::JoinedText);

        let fields = vec![
            (ReviewField::Id, FieldRule::BlockAttr("data-entry-id")),
            (ReviewField::Author, text("span.user-post__author-name")?),
            (
                ReviewField::Recommendation,
                text("span.user-post__author-recomendation > em")?,
            ),
            (ReviewField::Stars, text("span.user-post__score-count")?),
            (ReviewField::Content, text("div.user-post__text")?),
            (
                ReviewField::Pros,
                joined("div.review-feature__title--positives ~ div.review-feature__item")?,
            ),
            (
                ReviewField::Cons,
                joined("div.review-feature__title--negatives ~ div.review-feature__item")?,
            ),
            (ReviewField::Upvote, attr("button.vote-yes", "data-total-vote")?),
            (ReviewField::Downvote, attr("button.vote-no", "data-total-vote")?),
            (
                ReviewField::Posted,
                attr("span.user-post__published > time:nth-child(1)", "datetime")?,
            ),
            (
                ReviewField::Purchased,
                attr("span.user-post__published > time:nth-child(2)", "datetime")?,
            ),
        ];

        // Product codes are joined as a child path of the base
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base_url: base,
            block: selector(REVIEW_BLOCK)?,
            next_page: selector(NEXT_PAGE_LINK)?,
            fields,
        })
    }

    /// URL of the first reviews page for a product
    pub fn product_url(&self, product_code: &str) -> Result<String> {
        let mut url = self.base_url.join(product_code)?;
        url.set_fragment(Some("tab=reviews"));
        Ok(url.to_string())
    }

    /// Extract every review block and the next page link from one page
    pub fn parse(&self, html: &str) -> Result<ParsedPage> {
        let document = Html::parse_document(html);

        let records: Vec<RawReview> = document
            .select(&self.block)
            .map(|block| self.parse_block(block))
            .collect();

        let next_url = match document
            .select(&self.next_page)
            .next()
            .and_then(|e| e.value().attr("href"))
        {
            Some(href) => Some(self.base_url.join(href.trim())?.to_string()),
            None => None,
        };

        debug!(
            "Parsed {} review blocks, next page: {}",
            records.len(),
            next_url.as_deref().unwrap_or("none")
        );

        Ok(ParsedPage { records, next_url })
    }

    fn parse_block(&self, block: ElementRef<'_>) -> RawReview {
        let mut raw = RawReview::default();
        for (field, rule) in &self.fields {
            let value = rule.extract(block);
            if value.is_none() {
                trace!("Field {:?} missing in review block", field);
            }
            let slot = match field {
                ReviewField::Id => &mut raw.id,
                ReviewField::Author => &mut raw.author,
                ReviewField::Recommendation => &mut raw.recommendation,
                ReviewField::Stars => &mut raw.stars,
                ReviewField::Content => &mut raw.content,
                ReviewField::Pros => &mut raw.pros,
                ReviewField::Cons => &mut raw.cons,
                ReviewField::Upvote => &mut raw.upvote,
                ReviewField::Downvote => &mut raw.downvote,
                ReviewField::Posted => &mut raw.posted,
                ReviewField::Purchased => &mut raw.purchased,
            };
            *slot = value;
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REVIEW: &str = r#"
        <div class="js_product-review" data-entry-id="101">
          <span class="user-post__author-name"> Anna </span>
          <span class="user-post__author-recomendation"><em>Polecam</em></span>
          <span class="user-post__score-count">4,5/5</span>
          <span class="user-post__published">
            <time datetime="2023-05-01 10:00:00">rok temu</time>
            <time datetime="2023-04-20 08:30:00">rok temu</time>
          </span>
          <div class="user-post__text">Great
             kettle,   boils fast.</div>
          <div class="review-feature">
            <div class="review-feature__col">
              <div class="review-feature__title review-feature__title--positives">Zalety</div>
              <div class="review-feature__item">cheap</div>
              <div class="review-feature__item"> quiet </div>
            </div>
            <div class="review-feature__col">
              <div class="review-feature__title review-feature__title--negatives">Wady</div>
              <div class="review-feature__item">heavy</div>
            </div>
          </div>
          <button class="vote-yes" data-total-vote="12">Tak</button>
          <button class="vote-no" data-total-vote="3">Nie</button>
        </div>
    "#;

    fn parser() -> ReviewParser {
        ReviewParser::new("https://www.ceneo.pl").unwrap()
    }

    #[test]
    fn test_product_url() {
        assert_eq!(
            parser().product_url("12345").unwrap(),
            "https://www.ceneo.pl/12345#tab=reviews"
        );
    }

    #[test]
    fn test_product_url_keeps_base_path() {
        for base in ["https://shop.test/pl", "https://shop.test/pl/"] {
            let parser = ReviewParser::new(base).unwrap();
            assert_eq!(
                parser.product_url("123").unwrap(),
                "https://shop.test/pl/123#tab=reviews"
            );
        }
    }

    #[test]
    fn test_parse_full_review() {
        let html = format!("<html><body>{}</body></html>", FULL_REVIEW);
        let page = parser().parse(&html).unwrap();

        assert_eq!(page.records.len(), 1);
        let raw = &page.records[0];
        assert_eq!(raw.id.as_deref(), Some("101"));
        assert_eq!(raw.author.as_deref(), Some("Anna"));
        assert_eq!(raw.recommendation.as_deref(), Some("Polecam"));
        assert_eq!(raw.stars.as_deref(), Some("4,5/5"));
        assert_eq!(raw.pros.as_deref(), Some("cheap, quiet"));
        assert_eq!(raw.cons.as_deref(), Some("heavy"));
        assert_eq!(raw.upvote.as_deref(), Some("12"));
        assert_eq!(raw.downvote.as_deref(), Some("3"));
        assert_eq!(raw.posted.as_deref(), Some("2023-05-01 10:00:00"));
        assert_eq!(raw.purchased.as_deref(), Some("2023-04-20 08:30:00"));
        assert!(raw.content.as_deref().unwrap().starts_with("Great"));
        assert!(page.next_url.is_none());
    }

    #[test]
    fn test_missing_optional_fields_are_none() {
        let html = r#"
            <div class="js_product-review" data-entry-id="7">
              <span class="user-post__score-count">1/5</span>
            </div>
        "#;
        let page = parser().parse(html).unwrap();

        assert_eq!(page.records.len(), 1);
        let raw = &page.records[0];
        assert_eq!(raw.id.as_deref(), Some("7"));
        assert!(raw.author.is_none());
        assert!(raw.recommendation.is_none());
        assert!(raw.content.is_none());
        assert!(raw.upvote.is_none());
        assert!(raw.posted.is_none());
        // List fields join zero matches into an empty string
        assert_eq!(raw.pros.as_deref(), Some(""));
        assert_eq!(raw.cons.as_deref(), Some(""));
    }

    #[test]
    fn test_next_link_resolved_against_base() {
        let html = r#"
            <div class="js_product-review" data-entry-id="1"></div>
            <div class="js_product-review" data-entry-id="2"></div>
            <a class="pagination__item pagination__next" href="/12345/opinie-2">Dalej</a>
        "#;
        let page = parser().parse(html).unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(
            page.next_url.as_deref(),
            Some("https://www.ceneo.pl/12345/opinie-2")
        );
    }

    #[test]
    fn test_page_without_reviews() {
        let page = parser().parse("<html><body><p>Brak opinii</p></body></html>").unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_url.is_none());
    }
}
