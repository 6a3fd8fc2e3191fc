/// TMDB movie catalog
///
/// Crawls `/discover/movie` once per configured original language, restricted to
/// the configured release region and sorted newest first. The TMDB numeric id is
/// the natural key.
use reqwest::Client as HttpClient;

use crate::{
    error::AppResult,
    models::{DisplayMetadata, ItemKind, RawCandidate, TmdbDiscoverPage, TmdbMovie},
    services::catalog::{check_status, CatalogQuery, CatalogSource},
};

#[derive(Clone)]
pub struct TmdbSource {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_base_url: String,
    region: String,
    languages: Vec<String>,
}

impl TmdbSource {
    pub fn new(
        api_key: String,
        api_url: String,
        image_base_url: String,
        region: String,
        languages: Vec<String>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
            region,
            languages,
        }
    }

    fn to_candidate(&self, movie: TmdbMovie) -> RawCandidate {
        RawCandidate {
            kind: ItemKind::Movie,
            natural_key: movie.id.to_string(),
            title: movie.title,
            description: movie.overview,
            metadata: DisplayMetadata {
                image_url: movie
                    .poster_path
                    .map(|path| format!("{}{}", self.image_base_url, path)),
                language: movie.original_language,
                release_date: movie.release_date.filter(|d| !d.is_empty()),
                tags: movie.origin_country,
                authors: Vec::new(),
            },
        }
    }

    fn page_candidates(&self, page: u32, discover: TmdbDiscoverPage) -> Vec<RawCandidate> {
        // Past the last page counts as exhausted
        if discover.total_pages > 0 && page > discover.total_pages {
            return Vec::new();
        }

        discover
            .movies()
            .into_iter()
            .map(|movie| self.to_candidate(movie))
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogSource for TmdbSource {
    fn kind(&self) -> ItemKind {
        ItemKind::Movie
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn queries(&self) -> Vec<CatalogQuery> {
        self.languages
            .iter()
            .map(|language| {
                CatalogQuery::new(
                    format!("movies/{}", language),
                    vec![
                        ("with_original_language", language.clone()),
                        ("region", self.region.clone()),
                        ("with_origin_country", self.region.clone()),
                    ],
                )
            })
            .collect()
    }

    async fn fetch_page(&self, query: &CatalogQuery, page: u32) -> AppResult<Vec<RawCandidate>> {
        let url = format!("{}/discover/movie", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("sort_by", "release_date.desc"),
                ("include_adult", "false"),
            ])
            .query(&query.params)
            .query(&[("page", page)])
            .send()
            .await?;

        let response = check_status(self.name(), response).await?;
        let discover: TmdbDiscoverPage = response.json().await?;

        tracing::debug!(
            query = %query,
            page,
            total_pages = discover.total_pages,
            results = discover.results.len(),
            "Fetched TMDB page"
        );

        Ok(self.page_candidates(page, discover))
    }
}
