use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use crate::error::AppError;

use super::ItemKind;

/// What the user did with an item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Click,
    Search,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Click => "click",
            InteractionKind::Search => "search",
        }
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionKind::View),
            "click" => Ok(InteractionKind::Click),
            "search" => Ok(InteractionKind::Search),
            other => Err(AppError::InvalidInput(format!(
                "Unknown interaction type: {}",
                other
            ))),
        }
    }
}

/// Request body for `POST /interactions`
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInteractionRequest {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub interaction_type: InteractionKind,
}

/// One tracked interaction. Append-only; repeated views are separate rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub user_id: i64,
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub interaction_type: InteractionKind,
    pub created_at: DateTime<Utc>,
}
