//! Default values for configuration

/// Default review site base URL
pub fn default_base_url() -> String {
    std::env::var("OPINION_MINER_BASE_URL").unwrap_or_else(|_| "https://www.ceneo.pl".to_string())
}

/// Default user agent string
pub fn default_user_agent() -> String {
    format!("opinion-miner/{}", env!("CARGO_PKG_VERSION"))
}

/// Default per-page fetch timeout in seconds
pub fn default_page_timeout() -> u64 {
    30
}

/// Default timeout for a whole extraction run in seconds
pub fn default_overall_timeout() -> u64 {
    600
}

/// Default hard ceiling on pages followed per product
pub fn default_max_pages() -> u32 {
    500
}

/// Default chart width in pixels
pub fn default_chart_width() -> u32 {
    1000
}

/// Default chart height in pixels
pub fn default_chart_height() -> u32 {
    600
}
