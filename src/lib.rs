//! opinion-miner: scrape product reviews, chart them and keep them in SQLite.

pub mod chart;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod parse;
pub mod progress;
pub mod store;

pub use error::{Error, Result};
