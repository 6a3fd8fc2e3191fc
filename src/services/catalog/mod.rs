//! External catalog sources
//!
//! Each source enumerates a set of queries (languages for movies, subjects for
//! books) and pages through them. The ingestion pipeline owns pacing, retry and
//! deduplication; sources only translate one page request into candidates.
use std::fmt::Display;

use reqwest::{Response, StatusCode};

use crate::{
    error::{AppError, AppResult},
    models::{ItemKind, RawCandidate},
};

pub mod google_books;
pub mod tmdb;

pub use google_books::GoogleBooksSource;
pub use tmdb::TmdbSource;

/// One crawl path through a catalog, e.g. "Telugu movies" or "subject:fiction"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Human-readable label used in logs
    pub label: String,
    /// Query-string parameters specific to this path
    pub params: Vec<(String, String)>,
}

impl CatalogQuery {
    pub fn new(label: impl Into<String>, params: Vec<(&str, String)>) -> Self {
        Self {
            label: label.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

impl Display for CatalogQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

/// Paginated source of raw catalog items
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Kind of item every candidate from this source has
    fn kind(&self) -> ItemKind;

    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Crawl paths, in the order they should be visited
    fn queries(&self) -> Vec<CatalogQuery>;

    /// Fetches one page (1-based). An empty page means the query is exhausted.
    ///
    /// Returns `RateLimited` on HTTP 429 so the caller can back off and retry;
    /// any other failure is a transport error for this page only.
    async fn fetch_page(&self, query: &CatalogQuery, page: u32) -> AppResult<Vec<RawCandidate>>;
}

/// Maps non-success catalog responses onto the error taxonomy
pub(crate) async fn check_status(source: &str, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AppError::RateLimited(source.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ExternalApi(format!(
            "{} returned status {}: {}",
            source, status, body
        )));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_query_display_uses_label() {
        let query = CatalogQuery::new("movies/te", vec![("with_original_language", "te".into())]);
        assert_eq!(query.to_string(), "movies/te");
        assert_eq!(
            query.params,
            vec![("with_original_language".to_string(), "te".to_string())]
        );
    }
}
