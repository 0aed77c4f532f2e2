use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{Diary, DiaryStore, SaveOutcome, SavedDiary, SavedRecord};

pub const ALREADY_SAVED_TODAY: &str = "already saved today";

pub async fn create_diary(
    store: &dyn DiaryStore,
    max_chars: usize,
    user_id: Uuid,
    content: &str,
) -> Result<Diary, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("content must not be empty".into()));
    }
    let chars = content.chars().count();
    if chars > max_chars {
        return Err(AppError::BadRequest(format!(
            "content is {chars} characters, limit is {max_chars}"
        )));
    }
    if !store.user_exists(user_id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    let diary = store.create_diary(user_id, content).await?;
    info!(%user_id, diary_id = %diary.id, "diary created");
    Ok(diary)
}

/// Diaries delivered to the user on `date`. Nothing delivered is an empty list.
pub async fn delivered_on(
    store: &dyn DiaryStore,
    user_id: Uuid,
    date: Date,
) -> anyhow::Result<Vec<Diary>> {
    let diaries = store.delivered_diaries(user_id, date).await?;
    debug!(%user_id, %date, count = diaries.len(), "deliveries read");
    Ok(diaries)
}

pub async fn authored_by(store: &dyn DiaryStore, user_id: Uuid) -> anyhow::Result<Vec<Diary>> {
    store.diaries_by_author(user_id).await
}

/// Save `diary_id` for `user_id`, allowing one save per user per UTC day.
pub async fn save_diary(
    store: &dyn DiaryStore,
    user_id: Uuid,
    diary_id: Uuid,
    now: OffsetDateTime,
) -> Result<SavedRecord, AppError> {
    if !store.user_exists(user_id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    match store.save_diary(user_id, diary_id, now).await? {
        SaveOutcome::Saved(record) => {
            info!(%user_id, %diary_id, "diary saved");
            Ok(record)
        }
        SaveOutcome::AlreadySavedToday => {
            warn!(%user_id, %diary_id, "second save on the same day rejected");
            Err(AppError::Conflict(ALREADY_SAVED_TODAY.into()))
        }
        SaveOutcome::DiaryNotFound => Err(AppError::NotFound("Diary not found".into())),
    }
}

pub async fn saved_history(
    store: &dyn DiaryStore,
    user_id: Uuid,
) -> anyhow::Result<Vec<SavedDiary>> {
    store.saved_by_user(user_id).await
}
