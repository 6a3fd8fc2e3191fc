use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CollaborativeHit, ItemKind, PopularItem, RateItemRequest, Rating},
};

use super::{
    postgres::sql_int,
    store::{RatingsRepository, SignalAggregator},
};

/// Postgres ratings repository
#[derive(Clone)]
pub struct PgRatingsRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    user_id: i64,
    item_id: Uuid,
    item_type: String,
    rating: f32,
    created_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = AppError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        Ok(Rating {
            user_id: row.user_id,
            item_id: row.item_id,
            item_type: row.item_type.parse()?,
            value: row.rating,
            created_at: row.created_at,
        })
    }
}

fn into_ratings(rows: Vec<RatingRow>) -> AppResult<Vec<Rating>> {
    rows.into_iter().map(Rating::try_from).collect()
}

impl PgRatingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RatingsRepository for PgRatingsRepository {
    async fn top_rated(&self, user_id: i64, min_value: f32, limit: usize) -> AppResult<Vec<Rating>> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            r#"
            SELECT user_id, item_id, item_type, rating, created_at
            FROM ratings
            WHERE user_id = $1 AND rating >= $2
            ORDER BY rating DESC, updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(min_value)
        .bind(sql_int::<i64>("limit", limit)?)
        .fetch_all(&self.pool)
        .await?;

        into_ratings(rows)
    }

    async fn all_for_user(&self, user_id: i64) -> AppResult<Vec<Rating>> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            r#"
            SELECT user_id, item_id, item_type, rating, created_at
            FROM ratings
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        into_ratings(rows)
    }

    async fn rate(&self, user_id: i64, request: &RateItemRequest) -> AppResult<Rating> {
        request.validate()?;

        let row: RatingRow = sqlx::query_as(
            r#"
            INSERT INTO ratings (user_id, item_id, item_type, rating)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, item_id, item_type) DO UPDATE SET
                rating = EXCLUDED.rating,
                updated_at = now()
            RETURNING user_id, item_id, item_type, rating, created_at
            "#,
        )
        .bind(user_id)
        .bind(request.item_id)
        .bind(request.item_type.as_str())
        .bind(request.value)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn delete(&self, user_id: i64, kind: ItemKind, item_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM ratings WHERE user_id = $1 AND item_type = $2 AND item_id = $3",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Calls the SQL aggregation functions defined in the migrations
#[derive(Clone)]
pub struct PgSignalAggregator {
    pool: PgPool,
}

impl PgSignalAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CollaborativeRow {
    item_id: Uuid,
    item_type: String,
    title: String,
    poster_url: Option<String>,
    score: f64,
}

#[derive(sqlx::FromRow)]
struct PopularRow {
    item_id: Uuid,
    item_type: String,
    title: String,
    poster_url: Option<String>,
    avg_rating: Option<f64>,
    rating_count: i64,
}

#[async_trait::async_trait]
impl SignalAggregator for PgSignalAggregator {
    async fn collaborative(&self, user_id: i64, limit: usize) -> AppResult<Vec<CollaborativeHit>> {
        let rows: Vec<CollaborativeRow> = sqlx::query_as(
            r#"
            SELECT item_id, item_type, title, poster_url, score
            FROM get_collaborative_recommendations($1, $2)
            "#,
        )
        .bind(user_id)
        .bind(sql_int::<i32>("limit", limit)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CollaborativeHit {
                    item_id: row.item_id,
                    item_type: row.item_type.parse()?,
                    title: row.title,
                    poster_url: row.poster_url,
                    score: row.score,
                })
            })
            .collect()
    }

    async fn popular(&self, limit: usize) -> AppResult<Vec<PopularItem>> {
        let rows: Vec<PopularRow> = sqlx::query_as(
            r#"
            SELECT item_id, item_type, title, poster_url, avg_rating, rating_count
            FROM get_popular_items($1)
            "#,
        )
        .bind(sql_int::<i32>("limit", limit)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PopularItem {
                    item_id: row.item_id,
                    item_type: row.item_type.parse()?,
                    title: row.title,
                    poster_url: row.poster_url,
                    avg_rating: row.avg_rating,
                    rating_count: row.rating_count,
                })
            })
            .collect()
    }
}
