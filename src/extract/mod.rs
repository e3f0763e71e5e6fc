//! Paginated review extraction
//!
//! Pages are fetched strictly one after another: each page decides the URL
//! of the next. A run either returns every review of the product or fails
//! as a whole.

mod cancel;

pub use cancel::*;

use crate::config::ScrapeConfig;
use crate::error::{Error, Result};
use crate::fetch::PageFetcher;
use crate::models::Review;
use crate::normalize::normalize;
use crate::parse::ReviewParser;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// All reviews of one product from a completed run
#[derive(Debug, Clone)]
pub struct Extraction {
    pub product_id: String,
    pub reviews: Vec<Review>,
    pub pages_fetched: u32,
}

/// Progress reported after each page
#[derive(Debug, Clone)]
pub struct PageProgress {
    pub url: String,
    pub pages_fetched: u32,
    pub reviews_so_far: usize,
}

/// Drives fetch, parse and normalize until the last page
pub struct Extractor<F: PageFetcher> {
    fetcher: F,
    parser: ReviewParser,
    max_pages: u32,
    overall_timeout: Duration,
}

impl<F: PageFetcher> Extractor<F> {
    pub fn new(fetcher: F, parser: ReviewParser, config: &ScrapeConfig) -> Self {
        Self {
            fetcher,
            parser,
            max_pages: config.max_pages,
            overall_timeout: Duration::from_secs(config.overall_timeout_secs),
        }
    }

    /// Extract every review of a product
    pub async fn extract(&self, product_code: &str, cancel: &CancelToken) -> Result<Extraction> {
        self.extract_with_progress(product_code, cancel, |_| {}).await
    }

    /// Extract every review of a product, reporting after each page
    pub async fn extract_with_progress(
        &self,
        product_code: &str,
        cancel: &CancelToken,
        on_page: impl Fn(&PageProgress) + Send + Sync,
    ) -> Result<Extraction> {
        validate_product_code(product_code)?;

        let timeout_secs = self.overall_timeout.as_secs();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Extraction of {} cancelled", product_code);
                Err(Error::Cancelled)
            }
            result = tokio::time::timeout(
                self.overall_timeout,
                self.run(product_code, cancel, &on_page),
            ) => match result {
                Ok(extraction) => extraction,
                Err(_) => {
                    warn!("Extraction of {} timed out after {}s", product_code, timeout_secs);
                    Err(Error::Timeout(timeout_secs))
                }
            },
        }
    }

    async fn run(
        &self,
        product_code: &str,
        cancel: &CancelToken,
        on_page: &(impl Fn(&PageProgress) + Send + Sync),
    ) -> Result<Extraction> {
        let mut url = self.parser.product_url(product_code)?;
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut reviews = Vec::new();
        let mut pages_fetched = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if pages_fetched >= self.max_pages {
                warn!(
                    "Reached page ceiling ({}) for product {}",
                    self.max_pages, product_code
                );
                return Err(Error::PaginationLoop {
                    url,
                    pages: pages_fetched,
                });
            }
            if !visited.insert(page_key(&url)) {
                return Err(Error::PaginationLoop {
                    url,
                    pages: pages_fetched,
                });
            }

            let html = self.fetcher.fetch(&url).await?;
            pages_fetched += 1;

            let page = self.parser.parse(&html)?;
            for raw in page.records {
                let review = normalize(raw, product_code)?;
                if seen_ids.insert(review.id.clone()) {
                    reviews.push(review);
                } else {
                    debug!("Skipping repeated review {} on {}", review.id, url);
                }
            }

            on_page(&PageProgress {
                url: url.clone(),
                pages_fetched,
                reviews_so_far: reviews.len(),
            });

            match page.next_url {
                Some(next) => url = next,
                None => break,
            }
        }

        info!(
            "Extracted {} reviews of product {} from {} pages",
            reviews.len(),
            product_code,
            pages_fetched
        );

        Ok(Extraction {
            product_id: product_code.to_string(),
            reviews,
            pages_fetched,
        })
    }
}

/// Product codes are the site's numeric identifiers
pub fn validate_product_code(code: &str) -> Result<()> {
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidProductCode(code.to_string()));
    }
    Ok(())
}

/// Identity of a page for loop detection; fragments do not change the page
fn page_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recommendation;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    const BASE: &str = "https://reviews.test";

    /// Serves canned pages keyed by URL without fragment
    struct FakeFetcher {
        pages: HashMap<String, String>,
        fetches: AtomicU32,
        log: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl FakeFetcher {
        fn new(pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(u, html)| (page_key(u), html))
                    .collect(),
                fetches: AtomicU32::new(0),
                log: Mutex::new(Vec::new()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages.get(&page_key(url)).cloned().ok_or(Error::HttpStatus {
                code: 404,
                url: url.to_string(),
            })
        }
    }

    fn review_block(id: &str, stars: &str, recommendation: Option<&str>) -> String {
        let rec = recommendation
            .map(|r| {
                format!(
                    r#"<span class="user-post__author-recomendation"><em>{}</em></span>"#,
                    r
                )
            })
            .unwrap_or_default();
        format!(
            r#"<div class="js_product-review" data-entry-id="{id}">
                 {rec}
                 <span class="user-post__score-count">{stars}</span>
                 <div class="user-post__text">Review {id}</div>
                 <button class="vote-yes" data-total-vote="0"></button>
                 <button class="vote-no" data-total-vote="0"></button>
               </div>"#
        )
    }

    fn page(blocks: &[String], next: Option<&str>) -> String {
        let next = next
            .map(|href| format!(r#"<a class="pagination__next" href="{}">next</a>"#, href))
            .unwrap_or_default();
        format!("<html><body>{}{}</body></html>", blocks.join("\n"), next)
    }

    fn config() -> ScrapeConfig {
        ScrapeConfig {
            base_url: BASE.to_string(),
            max_pages: 50,
            overall_timeout_secs: 5,
            page_timeout_secs: 1,
            ..ScrapeConfig::default()
        }
    }

    fn extractor(fetcher: FakeFetcher, config: &ScrapeConfig) -> Extractor<FakeFetcher> {
        let parser = ReviewParser::new(&config.base_url).unwrap();
        Extractor::new(fetcher, parser, config)
    }

    #[tokio::test]
    async fn test_two_page_scenario() {
        let fetcher = FakeFetcher::new(vec![
            (
                "https://reviews.test/100",
                page(
                    &[
                        review_block("1", "5/5", Some("Polecam")),
                        review_block("2", "3,5/5", Some("Nie polecam")),
                    ],
                    Some("/100/opinie-2"),
                ),
            ),
            (
                "https://reviews.test/100/opinie-2",
                page(&[review_block("3", "1/5", None)], None),
            ),
        ]);
        let extractor = extractor(fetcher, &config());

        let extraction = extractor.extract("100", &CancelToken::new()).await.unwrap();
        assert_eq!(extraction.pages_fetched, 2);
        assert_eq!(extraction.reviews.len(), 3);
        assert_eq!(extraction.reviews[1].stars, 3.5);
        assert_eq!(
            extraction.reviews[2].recommendation,
            Recommendation::Unspecified
        );
        assert!(extraction.reviews.iter().all(|r| r.product_id == "100"));
        assert_eq!(extractor.fetcher.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(
            extractor.fetcher.log.lock().unwrap()[0],
            "https://reviews.test/100#tab=reviews"
        );
    }

    #[tokio::test]
    async fn test_chain_of_n_pages_fetches_exactly_n() {
        let n = 7;
        let mut pages = Vec::new();
        let urls: Vec<String> = (1..=n)
            .map(|i| {
                if i == 1 {
                    "https://reviews.test/42".to_string()
                } else {
                    format!("https://reviews.test/42/opinie-{}", i)
                }
            })
            .collect();
        for i in 1..=n {
            let next = if i < n {
                Some(format!("/42/opinie-{}", i + 1))
            } else {
                None
            };
            pages.push((
                urls[i - 1].as_str(),
                page(&[review_block(&i.to_string(), "4/5", None)], next.as_deref()),
            ));
        }
        let extractor = extractor(FakeFetcher::new(pages), &config());

        let extraction = assert_ok!(extractor.extract("42", &CancelToken::new()).await);
        assert_eq!(extraction.pages_fetched, n as u32);
        assert_eq!(extraction.reviews.len(), n);
        assert_eq!(extractor.fetcher.fetches.load(Ordering::SeqCst), n as u32);
    }

    #[tokio::test]
    async fn test_self_referencing_next_link_is_loop() {
        let fetcher = FakeFetcher::new(vec![
            (
                "https://reviews.test/5",
                page(&[review_block("1", "4/5", None)], Some("/5/opinie-2")),
            ),
            (
                "https://reviews.test/5/opinie-2",
                page(&[review_block("2", "4/5", None)], Some("/5/opinie-2")),
            ),
        ]);
        let extractor = extractor(fetcher, &config());

        let err = assert_err!(extractor.extract("5", &CancelToken::new()).await);
        assert!(matches!(err, Error::PaginationLoop { pages: 2, .. }));
        assert_eq!(extractor.fetcher.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_page_ceiling() {
        let mut pages = Vec::new();
        let urls: Vec<String> = (0..10)
            .map(|i| match i {
                0 => "https://reviews.test/9".to_string(),
                _ => format!("https://reviews.test/9/p{}", i),
            })
            .collect();
        for i in 0..10 {
            pages.push((
                urls[i].as_str(),
                page(&[], Some(&format!("/9/p{}", i + 1))),
            ));
        }
        let mut cfg = config();
        cfg.max_pages = 3;
        let extractor = extractor(FakeFetcher::new(pages), &cfg);

        let err = extractor.extract("9", &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::PaginationLoop { pages: 3, .. }));
        assert_eq!(extractor.fetcher.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_on_later_page_discards_everything() {
        let fetcher = FakeFetcher::new(vec![(
            "https://reviews.test/8",
            page(&[review_block("1", "4/5", None)], Some("/8/opinie-2")),
        )]);
        let extractor = extractor(fetcher, &config());

        let err = extractor.extract("8", &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { code: 404, .. }));
    }

    #[tokio::test]
    async fn test_malformed_record_aborts_run() {
        let fetcher = FakeFetcher::new(vec![(
            "https://reviews.test/3",
            page(&[review_block("1", "great/5", None)], None),
        )]);
        let extractor = extractor(fetcher, &config());

        let err = extractor.extract("3", &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_repeated_review_ids_kept_once() {
        let fetcher = FakeFetcher::new(vec![
            (
                "https://reviews.test/6",
                page(&[review_block("1", "4/5", None)], Some("/6/opinie-2")),
            ),
            (
                "https://reviews.test/6/opinie-2",
                page(
                    &[review_block("1", "4/5", None), review_block("2", "2/5", None)],
                    None,
                ),
            ),
        ]);
        let extractor = extractor(fetcher, &config());

        let extraction = extractor.extract("6", &CancelToken::new()).await.unwrap();
        let ids: Vec<_> = extraction.reviews.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_invalid_product_code() {
        let extractor = extractor(FakeFetcher::new(vec![]), &config());
        for code in ["", "12a", "../etc", "1 2"] {
            let err = extractor.extract(code, &CancelToken::new()).await.unwrap_err();
            assert!(matches!(err, Error::InvalidProductCode(_)));
        }
        assert_eq!(extractor.fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let fetcher = FakeFetcher::new(vec![(
            "https://reviews.test/1",
            page(&[review_block("1", "4/5", None)], None),
        )]);
        let extractor = extractor(fetcher, &config());
        let token = CancelToken::new();
        token.cancel();

        let err = extractor.extract("1", &token).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(extractor.fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_fetch() {
        let mut fetcher = FakeFetcher::new(vec![(
            "https://reviews.test/1",
            page(&[review_block("1", "4/5", None)], None),
        )]);
        fetcher.delay = Some(Duration::from_secs(2));
        let extractor = extractor(fetcher, &config());
        let token = CancelToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = extractor.extract("1", &token).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_overall_timeout() {
        let mut fetcher = FakeFetcher::new(vec![(
            "https://reviews.test/1",
            page(&[review_block("1", "4/5", None)], None),
        )]);
        fetcher.delay = Some(Duration::from_secs(3));
        let mut cfg = config();
        cfg.overall_timeout_secs = 1;
        let extractor = extractor(fetcher, &cfg);

        let err = extractor.extract("1", &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(1)));
    }

    #[tokio::test]
    async fn test_progress_reported_per_page() {
        let fetcher = FakeFetcher::new(vec![
            (
                "https://reviews.test/2",
                page(&[review_block("1", "4/5", None)], Some("/2/opinie-2")),
            ),
            (
                "https://reviews.test/2/opinie-2",
                page(&[review_block("2", "4/5", None)], None),
            ),
        ]);
        let extractor = extractor(fetcher, &config());
        let seen = Mutex::new(Vec::new());

        extractor
            .extract_with_progress("2", &CancelToken::new(), |p| {
                seen.lock().unwrap().push((p.pages_fetched, p.reviews_so_far));
            })
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (2, 2)]);
    }
}
