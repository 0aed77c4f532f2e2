use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::services;
use crate::{
    diaries::dto::{AuthoredDiaryItem, UserQuery},
    error::AppError,
    extract::ApiQuery,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct InitUserResponse {
    pub user_id: Uuid,
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/init", post(init_user))
        .route("/api/users/notifications", get(get_notifications))
}

#[instrument(skip(state))]
pub async fn init_user(State(state): State<AppState>) -> Result<Json<InitUserResponse>, AppError> {
    let user = services::init_user(state.store.as_ref()).await?;
    Ok(Json(InitUserResponse { user_id: user.id }))
}

#[instrument(skip(state))]
pub async fn get_notifications(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> Result<Json<Vec<AuthoredDiaryItem>>, AppError> {
    let diaries = services::notifications(state.store.as_ref(), q.user_id).await?;
    Ok(Json(diaries.into_iter().map(AuthoredDiaryItem::from).collect()))
}
