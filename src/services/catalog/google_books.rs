/// Google Books catalog
///
/// Crawls `/volumes?q=subject:<category>` once per configured category, newest
/// first, paging with `startIndex`. The volume id is the natural key.
use reqwest::Client as HttpClient;

use crate::{
    error::AppResult,
    models::{GoogleVolumesPage, ItemKind, RawCandidate},
    services::catalog::{check_status, CatalogQuery, CatalogSource},
};

/// Largest page the volumes endpoint serves
pub const PAGE_SIZE: u32 = 40;

#[derive(Clone)]
pub struct GoogleBooksSource {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    categories: Vec<String>,
}

impl GoogleBooksSource {
    pub fn new(api_key: Option<String>, api_url: String, categories: Vec<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            categories,
        }
    }

    fn start_index(page: u32) -> u32 {
        page.saturating_sub(1) * PAGE_SIZE
    }

    fn page_candidates(volumes: GoogleVolumesPage) -> Vec<RawCandidate> {
        volumes.volumes().into_iter().map(RawCandidate::from).collect()
    }
}

#[async_trait::async_trait]
impl CatalogSource for GoogleBooksSource {
    fn kind(&self) -> ItemKind {
        ItemKind::Book
    }

    fn name(&self) -> &'static str {
        "google_books"
    }

    fn queries(&self) -> Vec<CatalogQuery> {
        self.categories
            .iter()
            .map(|category| {
                CatalogQuery::new(
                    format!("books/{}", category),
                    vec![("q", format!("subject:{}", category))],
                )
            })
            .collect()
    }

    async fn fetch_page(&self, query: &CatalogQuery, page: u32) -> AppResult<Vec<RawCandidate>> {
        let url = format!("{}/volumes", self.api_url);

        let mut request = self
            .http_client
            .get(&url)
            .query(&query.params)
            .query(&[("orderBy", "newest"), ("printType", "books")])
            .query(&[
                ("startIndex", Self::start_index(page)),
                ("maxResults", PAGE_SIZE),
            ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = check_status(self.name(), request.send().await?).await?;
        let volumes: GoogleVolumesPage = response.json().await?;

        tracing::debug!(
            query = %query,
            page,
            total_items = volumes.total_items,
            results = volumes.items.len(),
            "Fetched Google Books page"
        );

        Ok(Self::page_candidates(volumes))
    }
}
