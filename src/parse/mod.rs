//! Review page parsing
//!
//! Every structural selector the review site exposes lives in this module,
//! so a markup change on the site only touches the parser.

mod reviews;

pub use reviews::*;

/// Raw, unnormalized field values of one review block.
///
/// Each field is extracted independently; `None` means the element or
/// attribute was not present on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReview {
    pub id: Option<String>,
    pub author: Option<String>,
    pub recommendation: Option<String>,
    pub stars: Option<String>,
    pub content: Option<String>,
    pub pros: Option<String>,
    pub cons: Option<String>,
    pub upvote: Option<String>,
    pub downvote: Option<String>,
    pub posted: Option<String>,
    pub purchased: Option<String>,
}

/// Result of parsing one page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub records: Vec<RawReview>,
    /// Absolute URL of the following page, `None` on the last page
    pub next_url: Option<String>,
}

/// Collapse every whitespace run (newlines included) into one space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
