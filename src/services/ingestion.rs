/// Catalog → embedding → similarity store sync
///
/// A run walks `Fetching → Filtering → Embedding → Done` once per item kind.
/// Upserts are keyed on the natural key, so a run that is killed part way is
/// recovered by simply running again.
use futures::{stream, StreamExt};
use std::{collections::HashSet, fmt::Display, sync::Arc, time::Duration};

use crate::{
    db::SimilarityStore,
    error::{AppError, AppResult},
    models::{ItemKind, NewItem, RawCandidate, SyncReport},
    services::{
        catalog::{CatalogQuery, CatalogSource},
        embedding::{embedding_input, EmbeddingService},
    },
};

/// Pacing and sizing knobs for a sync run
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Stop crawling a kind after this many unique candidates
    pub target_per_kind: usize,
    /// Page cap per query
    pub max_pages: u32,
    /// Pause between successive catalog calls
    pub request_delay: Duration,
    /// Sleep after a 429 before retrying the same page
    pub rate_limit_backoff: Duration,
    /// Retries per page before it is skipped like any other transport error
    pub max_rate_limit_retries: u32,
    /// In-flight embedding + upsert tasks
    pub embed_concurrency: usize,
    pub max_embedding_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Fetching,
    Filtering,
    Embedding,
    Done,
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SyncPhase::Fetching => "fetching",
            SyncPhase::Filtering => "filtering",
            SyncPhase::Embedding => "embedding",
            SyncPhase::Done => "done",
        })
    }
}

/// Candidate that passed filtering, with its embedding input prepared
struct Prepared {
    natural_key: String,
    title: String,
    description: String,
    input: String,
    candidate: RawCandidate,
}

pub struct IngestionPipeline {
    sources: Vec<Arc<dyn CatalogSource>>,
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn SimilarityStore>,
    settings: SyncSettings,
}

impl IngestionPipeline {
    pub fn new(
        sources: Vec<Arc<dyn CatalogSource>>,
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn SimilarityStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            sources,
            embedder,
            store,
            settings,
        }
    }

    /// Syncs every kind that has at least one source, in `ItemKind::ALL` order
    pub async fn run_all(&self) -> Vec<(ItemKind, SyncReport)> {
        let mut reports = Vec::new();
        for kind in ItemKind::ALL {
            if !self.sources.iter().any(|s| s.kind() == kind) {
                tracing::info!(kind = %kind, "No catalog source configured, skipping");
                continue;
            }
            reports.push((kind, self.run_kind(kind).await));
        }
        reports
    }

    /// Runs the full sync for one kind. Never fails; problems end up in the report.
    pub async fn run_kind(&self, kind: ItemKind) -> SyncReport {
        let mut report = SyncReport::default();

        tracing::info!(kind = %kind, phase = %SyncPhase::Fetching, "Sync phase");
        let candidates = self.fetch_candidates(kind).await;
        report.fetched = candidates.len();

        if report.is_exhausted() {
            tracing::warn!(kind = %kind, "All catalog sources exhausted without candidates");
            tracing::info!(kind = %kind, phase = %SyncPhase::Done, "Sync phase");
            return report;
        }

        tracing::info!(kind = %kind, phase = %SyncPhase::Filtering, fetched = report.fetched, "Sync phase");
        let prepared = self.filter(candidates);
        report.skipped = report.fetched - prepared.len();

        tracing::info!(kind = %kind, phase = %SyncPhase::Embedding, candidates = prepared.len(), "Sync phase");
        let outcomes: Vec<bool> = stream::iter(prepared)
            .map(|item| self.ingest_one(item))
            .buffer_unordered(self.settings.embed_concurrency.max(1))
            .collect()
            .await;

        report.succeeded = outcomes.iter().filter(|ok| **ok).count();
        report.failed = outcomes.len() - report.succeeded;

        tracing::info!(
            kind = %kind,
            phase = %SyncPhase::Done,
            fetched = report.fetched,
            skipped = report.skipped,
            succeeded = report.succeeded,
            failed = report.failed,
            "Sync phase"
        );
        report
    }

    /// Crawls every query of every source for `kind` until the target is reached
    /// or the sources run dry. Natural keys seen earlier in the crawl are dropped.
    async fn fetch_candidates(&self, kind: ItemKind) -> Vec<RawCandidate> {
        let target = self.settings.target_per_kind;
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut calls = 0usize;

        'sources: for source in self.sources.iter().filter(|s| s.kind() == kind) {
            for query in source.queries() {
                for page in 1..=self.settings.max_pages {
                    if candidates.len() >= target {
                        break 'sources;
                    }

                    let items = match self
                        .fetch_with_backoff(source.as_ref(), &query, page, &mut calls)
                        .await
                    {
                        Ok(items) => items,
                        Err(e) => {
                            tracing::warn!(
                                source = source.name(),
                                query = %query,
                                page,
                                error = %e,
                                "Skipping catalog page"
                            );
                            continue;
                        }
                    };

                    if items.is_empty() {
                        tracing::debug!(source = source.name(), query = %query, page, "Query exhausted");
                        break;
                    }

                    for candidate in items {
                        if candidates.len() >= target {
                            break;
                        }
                        if candidate.kind == kind && seen.insert(candidate.natural_key.clone()) {
                            candidates.push(candidate);
                        }
                    }
                }
            }
        }

        tracing::info!(kind = %kind, calls, unique = candidates.len(), "Catalog crawl finished");
        candidates
    }

    /// Fetches one page, sleeping before every call but the first and backing
    /// off on rate limits. Exhausted retries surface as a transport error.
    async fn fetch_with_backoff(
        &self,
        source: &dyn CatalogSource,
        query: &CatalogQuery,
        page: u32,
        calls: &mut usize,
    ) -> AppResult<Vec<RawCandidate>> {
        let mut retries = 0;
        loop {
            if *calls > 0 {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            *calls += 1;

            match source.fetch_page(query, page).await {
                Err(AppError::RateLimited(what)) => {
                    if retries >= self.settings.max_rate_limit_retries {
                        return Err(AppError::ExternalApi(format!(
                            "{} still rate limited after {} retries",
                            what, retries
                        )));
                    }
                    retries += 1;
                    tracing::warn!(
                        source = source.name(),
                        query = %query,
                        page,
                        retry = retries,
                        backoff_ms = self.settings.rate_limit_backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(self.settings.rate_limit_backoff).await;
                }
                other => return other,
            }
        }
    }

    /// Drops candidates without a usable title and description
    fn filter(&self, candidates: Vec<RawCandidate>) -> Vec<Prepared> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let Some((title, description)) = candidate.embeddable_text() else {
                    tracing::debug!(
                        natural_key = %candidate.natural_key,
                        "Skipping candidate without title or description"
                    );
                    return None;
                };
                let title = title.to_string();
                let description = description.to_string();
                let input = embedding_input(&title, &description, self.settings.max_embedding_chars);
                Some(Prepared {
                    natural_key: candidate.natural_key.clone(),
                    title,
                    description,
                    input,
                    candidate,
                })
            })
            .collect()
    }

    /// Embeds and upserts one candidate. Failures are logged and reported as `false`.
    async fn ingest_one(&self, item: Prepared) -> bool {
        let natural_key = item.natural_key.clone();
        let kind = item.candidate.kind;

        match self.embed_and_upsert(item).await {
            Ok(id) => {
                tracing::debug!(kind = %kind, natural_key = %natural_key, id = %id, "Upserted item");
                true
            }
            Err(e) => {
                tracing::error!(kind = %kind, natural_key = %natural_key, error = %e, "Failed to ingest item");
                false
            }
        }
    }

    async fn embed_and_upsert(&self, item: Prepared) -> AppResult<uuid::Uuid> {
        let embedding = self.embedder.embed(&item.input).await?;

        self.store
            .upsert(NewItem {
                kind: item.candidate.kind,
                natural_key: item.natural_key,
                title: item.title,
                description: item.description,
                metadata: item.candidate.metadata,
                embedding,
            })
            .await
    }
}
