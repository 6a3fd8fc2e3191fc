use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::ItemKind;

pub const MIN_RATING: f32 = 0.5;
pub const MAX_RATING: f32 = 5.0;

/// A user's rating of one item. Unique per `(user_id, item_id, item_type)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: i64,
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub value: f32,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating or replacing a rating
#[derive(Debug, Clone, Deserialize)]
pub struct RateItemRequest {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    #[serde(alias = "rating")]
    pub value: f32,
}

impl RateItemRequest {
    /// Checks the value lies in `[0.5, 5.0]`
    pub fn validate(&self) -> AppResult<()> {
        if !self.value.is_finite() || self.value < MIN_RATING || self.value > MAX_RATING {
            return Err(AppError::InvalidInput(format!(
                "Rating must be between {} and {}, got {}",
                MIN_RATING, MAX_RATING, self.value
            )));
        }
        Ok(())
    }
}
