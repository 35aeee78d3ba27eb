//! NewsRAG news crate - corpus acquisition from NewsAPI.
//!
//! Pages through `/v2/everything` for each configured query term, merges
//! the results by URL, and turns each article into a corpus document.

pub mod article;
pub mod client;

pub use article::{dedup_by_url, NewsArticle, NewsSource};
pub use client::{date_range, evaluate_page, NewsApiClient, NewsApiPage, PageOutcome};
