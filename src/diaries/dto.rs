use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::Diary;

#[derive(Debug, Deserialize)]
pub struct CreateDiaryRequest {
    pub user_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveDiaryRequest {
    pub user_id: Uuid,
    pub diary_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// A diary as a reader sees it.
#[derive(Debug, Serialize)]
pub struct DiaryItem {
    pub id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A diary as its author sees it.
#[derive(Debug, Serialize)]
pub struct AuthoredDiaryItem {
    pub id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub saved_count: i64,
}

impl From<Diary> for DiaryItem {
    fn from(d: Diary) -> Self {
        Self {
            id: d.id,
            content: d.content,
            created_at: d.created_at,
        }
    }
}

impl From<Diary> for AuthoredDiaryItem {
    fn from(d: Diary) -> Self {
        Self {
            id: d.id,
            content: d.content,
            created_at: d.created_at,
            saved_count: d.saved_count,
        }
    }
}
