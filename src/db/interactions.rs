use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Interaction, TrackInteractionRequest},
};

use super::store::InteractionLog;

/// Postgres interaction log
#[derive(Clone)]
pub struct PgInteractionLog {
    pool: PgPool,
}

impl PgInteractionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InteractionRow {
    user_id: i64,
    item_id: Uuid,
    item_type: String,
    interaction_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<InteractionRow> for Interaction {
    type Error = AppError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(Interaction {
            user_id: row.user_id,
            item_id: row.item_id,
            item_type: row.item_type.parse()?,
            interaction_type: row.interaction_type.parse()?,
            created_at: row.created_at,
        })
    }
}

#[async_trait::async_trait]
impl InteractionLog for PgInteractionLog {
    async fn record(&self, user_id: i64, request: &TrackInteractionRequest) -> AppResult<Interaction> {
        let row: InteractionRow = sqlx::query_as(
            r#"
            INSERT INTO interactions (user_id, item_id, item_type, interaction_type)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, item_id, item_type, interaction_type, created_at
            "#,
        )
        .bind(user_id)
        .bind(request.item_id)
        .bind(request.item_type.as_str())
        .bind(request.interaction_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}
