use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{DisplayMetadata, Item, ItemKind, NewItem, Neighbor},
};

use super::{postgres::sql_int, store::SimilarityStore};

/// Postgres + pgvector backed similarity store.
///
/// Movies and books live in separate tables with the same shape apart from the
/// natural key column (`tmdb_id` / `google_id`). Similarity is cosine similarity,
/// `1 - (embedding <=> query)`.
#[derive(Clone)]
pub struct PgSimilarityStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    natural_key: String,
    title: String,
    description: String,
    metadata: Json<DisplayMetadata>,
    created_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self, kind: ItemKind) -> Item {
        Item {
            id: self.id,
            kind,
            natural_key: self.natural_key,
            title: self.title,
            description: self.description,
            metadata: self.metadata.0,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NeighborRow {
    id: Uuid,
    title: String,
    image_url: Option<String>,
    similarity: f64,
}

impl PgSimilarityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select_columns(kind: ItemKind) -> String {
        format!(
            "id, {} AS natural_key, title, description, metadata, created_at",
            kind.natural_key_column()
        )
    }
}

#[async_trait::async_trait]
impl SimilarityStore for PgSimilarityStore {
    async fn upsert(&self, item: NewItem) -> AppResult<Uuid> {
        let key = item.kind.natural_key_column();
        let sql = format!(
            r#"
            INSERT INTO {table} ({key}, title, description, metadata, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ({key}) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding,
                updated_at = now()
            RETURNING id
            "#,
            table = item.kind.table(),
            key = key,
        );

        let (id,): (Uuid,) = sqlx::query_as(&sql)
            .bind(&item.natural_key)
            .bind(&item.title)
            .bind(&item.description)
            .bind(Json(&item.metadata))
            .bind(Vector::from(item.embedding))
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn nearest(
        &self,
        kind: ItemKind,
        vector: &[f32],
        threshold: f64,
        count: usize,
    ) -> AppResult<Vec<Neighbor>> {
        let sql = format!(
            r#"
            SELECT id, title, metadata->>'image_url' AS image_url,
                   (1 - (embedding <=> $1))::float8 AS similarity
            FROM {table}
            WHERE embedding IS NOT NULL AND 1 - (embedding <=> $1) >= $2
            ORDER BY embedding <=> $1
            LIMIT $3
            "#,
            table = kind.table(),
        );

        let rows: Vec<NeighborRow> = sqlx::query_as(&sql)
            .bind(Vector::from(vector.to_vec()))
            .bind(threshold)
            .bind(sql_int::<i64>("count", count)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Neighbor {
                id: row.id,
                kind,
                title: row.title,
                image_url: row.image_url,
                similarity: row.similarity,
            })
            .collect())
    }

    async fn get_embedding(&self, kind: ItemKind, id: Uuid) -> AppResult<Vec<f32>> {
        let sql = format!("SELECT embedding FROM {} WHERE id = $1", kind.table());

        let row: Option<(Option<Vector>,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((Some(embedding),)) => Ok(embedding.to_vec()),
            Some((None,)) => Err(AppError::NotFound(format!("{} {} has no embedding", kind, id))),
            None => Err(AppError::NotFound(format!("{} {}", kind, id))),
        }
    }

    async fn recent(&self, kind: ItemKind, count: usize) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC LIMIT $1",
            Self::select_columns(kind),
            kind.table()
        );

        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(sql_int::<i64>("count", count)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_item(kind)).collect())
    }

    async fn get_item(&self, kind: ItemKind, id: Uuid) -> AppResult<Item> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::select_columns(kind),
            kind.table()
        );

        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.into_item(kind))
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, id)))
    }

    async fn list(&self, kind: ItemKind, skip: usize, limit: usize) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC, id OFFSET $1 LIMIT $2",
            Self::select_columns(kind),
            kind.table()
        );

        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(sql_int::<i64>("skip", skip)?)
            .bind(sql_int::<i64>("limit", limit)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_item(kind)).collect())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
