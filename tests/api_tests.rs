use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use cinelibre_api::{
    db::{InMemoryCatalog, SimilarityStore},
    error::{AppError, AppResult},
    models::{DisplayMetadata, Item, ItemKind, Neighbor, NewItem},
    routes::{create_router, AppState},
    services::{EmbeddingService, RecommendationEngine, SemanticSearch, SharedEmbedder},
};

/// Maps a few known phrases onto fixed directions; everything else points at books
struct PhraseEmbedder;

#[async_trait::async_trait]
impl EmbeddingService for PhraseEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(if text.contains("cricket") {
            vec![1.0, 0.0, 0.0]
        } else if text.contains("space") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        })
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model(&self) -> String {
        "phrase-test".to_string()
    }
}

/// Delegates to the in-memory catalog but fails like Postgres on counts that do not fit a BIGINT
struct BigintBoundedStore(Arc<InMemoryCatalog>);

fn bigint(value: usize) -> AppResult<()> {
    if i64::try_from(value).is_err() {
        return Err(AppError::Internal("LIMIT must not be negative".to_string()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl SimilarityStore for BigintBoundedStore {
    async fn upsert(&self, item: NewItem) -> AppResult<Uuid> {
        self.0.upsert(item).await
    }

    async fn nearest(
        &self,
        kind: ItemKind,
        vector: &[f32],
        threshold: f64,
        count: usize,
    ) -> AppResult<Vec<Neighbor>> {
        bigint(count)?;
        self.0.nearest(kind, vector, threshold, count).await
    }

    async fn get_embedding(&self, kind: ItemKind, id: Uuid) -> AppResult<Vec<f32>> {
        self.0.get_embedding(kind, id).await
    }

    async fn recent(&self, kind: ItemKind, count: usize) -> AppResult<Vec<Item>> {
        bigint(count)?;
        self.0.recent(kind, count).await
    }

    async fn get_item(&self, kind: ItemKind, id: Uuid) -> AppResult<Item> {
        self.0.get_item(kind, id).await
    }

    async fn list(&self, kind: ItemKind, skip: usize, limit: usize) -> AppResult<Vec<Item>> {
        bigint(skip)?;
        bigint(limit)?;
        self.0.list(kind, skip, limit).await
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct Catalog {
    lagaan: Uuid,
    iqbal: Uuid,
    mission_mangal: Uuid,
    wings_of_fire: Uuid,
}

async fn add(store: &InMemoryCatalog, kind: ItemKind, key: &str, title: &str, embedding: Vec<f32>) -> Uuid {
    store
        .upsert(NewItem {
            kind,
            natural_key: key.to_string(),
            title: title.to_string(),
            description: format!("{} description", title),
            metadata: DisplayMetadata {
                image_url: Some(format!("https://img.test/{}.jpg", key)),
                ..Default::default()
            },
            embedding,
        })
        .await
        .unwrap()
}

async fn seed_catalog() -> (Arc<InMemoryCatalog>, Catalog) {
    let store = Arc::new(InMemoryCatalog::new());

    let catalog = Catalog {
        lagaan: add(&store, ItemKind::Movie, "1", "Lagaan", vec![1.0, 0.0, 0.0]).await,
        iqbal: add(&store, ItemKind::Movie, "2", "Iqbal", vec![0.9, 0.1, 0.0]).await,
        mission_mangal: add(&store, ItemKind::Movie, "3", "Mission Mangal", vec![0.0, 1.0, 0.0]).await,
        wings_of_fire: add(&store, ItemKind::Book, "b1", "Wings of Fire", vec![0.0, 0.0, 1.0]).await,
    };

    (store, catalog)
}

fn server_over(items: Arc<dyn SimilarityStore>, memory: Arc<InMemoryCatalog>) -> TestServer {
    let embedder = SharedEmbedder::ready(Arc::new(PhraseEmbedder));
    let state = Arc::new(AppState {
        engine: RecommendationEngine::new(items.clone(), memory.clone(), memory.clone()),
        search: SemanticSearch::new(Arc::new(embedder.clone()), items.clone()),
        store: items,
        ratings: memory.clone(),
        interactions: memory,
        embedder,
    });

    TestServer::new(create_router(state)).unwrap()
}

async fn create_test_server() -> (TestServer, Catalog) {
    let (store, catalog) = seed_catalog().await;
    (server_over(store.clone(), store), catalog)
}

fn user(id: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_static(id),
    )
}

fn ids(items: &Value, field: &str) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item[field].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "online");
    assert_eq!(body["embedding_ready"], true);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _) = create_test_server().await;

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-123"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-123");

    let generated = server.get("/health").await;
    assert!(!generated.header("x-request-id").is_empty());
}

#[tokio::test]
async fn test_anonymous_recommendations_are_diverse_recent() {
    let (server, _) = create_test_server().await;

    let response = server
        .get("/api/v1/recommendations/personalized?limit=4")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["method"], "diverse_recent");
    let types: Vec<String> = ids(&body["recommendations"], "item_type");
    assert_eq!(types.iter().filter(|t| *t == "movie").count(), 2);
    assert_eq!(types.iter().filter(|t| *t == "book").count(), 1);
}

#[tokio::test]
async fn test_rating_drives_content_based_recommendations() {
    let (server, catalog) = create_test_server().await;
    let (name, value) = user("1");

    server
        .post("/api/v1/ratings")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "item_id": catalog.lagaan,
            "item_type": "movie",
            "rating": 5.0
        }))
        .await
        .assert_status_ok();

    let response = server
        .get("/api/v1/recommendations/personalized")
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["method"], "content_based");
    let recommended = ids(&body["recommendations"], "item_id");
    assert_eq!(recommended, vec![catalog.iqbal.to_string()]);
    assert_eq!(
        body["recommendations"][0]["based_on"],
        catalog.lagaan.to_string()
    );
}

#[tokio::test]
async fn test_similar_items_exclude_the_item() {
    let (server, catalog) = create_test_server().await;

    let response = server
        .get(&format!("/api/v1/recommendations/similar/movie/{}", catalog.lagaan))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["method"], "content_based");
    let similar = ids(&body["similar_items"], "id");
    assert_eq!(similar, vec![catalog.iqbal.to_string()]);
    assert!(!similar.contains(&catalog.mission_mangal.to_string()));
}

#[tokio::test]
async fn test_similar_items_errors() {
    let (server, catalog) = create_test_server().await;

    server
        .get(&format!("/api/v1/recommendations/similar/movie/{}", Uuid::new_v4()))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .get(&format!("/api/v1/recommendations/similar/podcast/{}", catalog.lagaan))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_popular_without_ratings_returns_recent_movies() {
    let (server, _) = create_test_server().await;

    let response = server.get("/api/v1/recommendations/popular?limit=2").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["method"], "recent_items");
    assert_eq!(body["popular_items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_semantic_search() {
    let (server, catalog) = create_test_server().await;

    let response = server
        .get("/api/v1/search/semantic?q=space%20mission&type=movie")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["query"], "space mission");
    assert_eq!(
        ids(&body["results"], "id"),
        vec![catalog.mission_mangal.to_string()]
    );

    let books = server
        .get("/api/v1/search/semantic?q=autobiography&type=book")
        .await;
    books.assert_status_ok();
    let body: Value = books.json();
    assert_eq!(
        ids(&body["results"], "id"),
        vec![catalog.wings_of_fire.to_string()]
    );

    server
        .get("/api/v1/search/semantic?q=ab")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rating_validation_and_identity() {
    let (server, catalog) = create_test_server().await;
    let (name, value) = user("9");

    server
        .post("/api/v1/ratings")
        .json(&json!({ "item_id": catalog.lagaan, "item_type": "movie", "rating": 4.0 }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/v1/ratings")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "item_id": catalog.lagaan, "item_type": "movie", "rating": 7.5 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/v1/ratings")
        .add_header(name, value)
        .json(&json!({ "item_id": Uuid::new_v4(), "item_type": "movie", "rating": 3.0 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rerating_overwrites_and_delete() {
    let (server, catalog) = create_test_server().await;
    let (name, value) = user("5");

    for rating in [2.0, 4.5] {
        server
            .post("/api/v1/ratings")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "item_id": catalog.wings_of_fire, "item_type": "book", "rating": rating }))
            .await
            .assert_status_ok();
    }

    let response = server
        .get("/api/v1/ratings/my?item_type=book")
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_ok();
    let ratings: Vec<Value> = response.json();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0]["value"], 4.5);

    let movies: Vec<Value> = server
        .get("/api/v1/ratings/my?item_type=movie")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert!(movies.is_empty());

    let path = format!("/api/v1/ratings/book/{}", catalog.wings_of_fire);
    server
        .delete(&path)
        .add_header(name.clone(), value.clone())
        .await
        .assert_status_ok();
    server
        .delete(&path)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_reads() {
    let (server, catalog) = create_test_server().await;

    let response = server.get("/api/v1/movies?skip=1&limit=5").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["skip"], 1);
    assert_eq!(body["movies"].as_array().unwrap().len(), 2);

    let movie: Value = server
        .get(&format!("/api/v1/movies/{}", catalog.lagaan))
        .await
        .json();
    assert_eq!(movie["title"], "Lagaan");

    server
        .get(&format!("/api/v1/books/{}", catalog.lagaan))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/v1/books/{}", catalog.wings_of_fire))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_oversized_limits_are_bounded() {
    let (memory, catalog) = seed_catalog().await;
    let server = server_over(Arc::new(BigintBoundedStore(memory.clone())), memory);

    let response = server
        .get("/api/v1/search/semantic?q=cricket%20match&limit=18446744073709551615")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        ids(&body["results"], "id"),
        vec![catalog.lagaan.to_string(), catalog.iqbal.to_string()]
    );

    server
        .get("/api/v1/movies?limit=18446744073709551615")
        .await
        .assert_status_ok();

    server
        .get("/api/v1/movies?skip=18446744073709551615")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get(&format!(
            "/api/v1/recommendations/similar/movie/{}?limit=18446744073709551615",
            catalog.lagaan
        ))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_collaborative_recommendations_carry_posters() {
    let (server, catalog) = create_test_server().await;

    for (user_id, item) in [("1", catalog.lagaan), ("2", catalog.lagaan), ("2", catalog.mission_mangal)] {
        let (name, value) = user(user_id);
        server
            .post("/api/v1/ratings")
            .add_header(name, value)
            .json(&json!({ "item_id": item, "item_type": "movie", "rating": 5.0 }))
            .await
            .assert_status_ok();
    }

    let (name, value) = user("1");
    let body: Value = server
        .get("/api/v1/recommendations/personalized")
        .add_header(name, value)
        .await
        .json();

    assert_eq!(body["method"], "collaborative_filtering");
    let first = &body["recommendations"][0];
    assert_eq!(first["item_id"], catalog.mission_mangal.to_string());
    assert_eq!(first["poster_url"], "https://img.test/3.jpg");
}

#[tokio::test]
async fn test_track_interactions() {
    let (memory, catalog) = seed_catalog().await;
    let server = server_over(memory.clone(), memory.clone());
    let (name, value) = user("3");

    server
        .post("/api/v1/interactions")
        .json(&json!({ "item_id": catalog.iqbal, "item_type": "movie", "interaction_type": "view" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/interactions")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "item_id": catalog.iqbal, "item_type": "movie", "interaction_type": "click" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["interaction_type"], "click");
    assert_eq!(body["user_id"], 3);

    server
        .post("/api/v1/interactions")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "item_id": Uuid::new_v4(), "item_type": "book", "interaction_type": "view" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post("/api/v1/interactions")
        .add_header(name, value)
        .json(&json!({ "item_id": catalog.iqbal, "item_type": "movie", "interaction_type": "hover" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let logged = memory.interactions_for(3).await;
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].item_id, catalog.iqbal);
}
