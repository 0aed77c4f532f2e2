use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::dto::{
    AuthoredDiaryItem, CreateDiaryRequest, DiaryItem, MessageResponse, SaveDiaryRequest, UserQuery,
};
use super::services;
use crate::{
    calendar::today_utc,
    error::AppError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
    store::SavedDiary,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/diaries/today", get(get_today))
        .route("/api/diaries/my", get(get_my_diaries))
        .route("/api/diaries/saved", get(get_saved_diaries))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/api/diaries", post(create_diary))
        .route("/api/diaries/save", post(save_diary))
}

#[instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn create_diary(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateDiaryRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::create_diary(
        state.store.as_ref(),
        state.config.max_diary_chars,
        body.user_id,
        &body.content,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Diary created successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_today(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> Result<Json<Vec<DiaryItem>>, AppError> {
    let diaries = services::delivered_on(state.store.as_ref(), q.user_id, today_utc()).await?;
    Ok(Json(diaries.into_iter().map(DiaryItem::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_my_diaries(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> Result<Json<Vec<AuthoredDiaryItem>>, AppError> {
    let diaries = services::authored_by(state.store.as_ref(), q.user_id).await?;
    Ok(Json(diaries.into_iter().map(AuthoredDiaryItem::from).collect()))
}

#[instrument(skip(state))]
pub async fn save_diary(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SaveDiaryRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::save_diary(
        state.store.as_ref(),
        body.user_id,
        body.diary_id,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Diary saved successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_saved_diaries(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> Result<Json<Vec<SavedDiary>>, AppError> {
    let saved = services::saved_history(state.store.as_ref(), q.user_id).await?;
    Ok(Json(saved))
}
