use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::engine::{distribute, DistributionReport};
use crate::{
    calendar::{parse_date, today_utc},
    error::AppError,
    extract::ApiQuery,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DistributeQuery {
    /// `YYYY-MM-DD`; today (UTC) when absent.
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DistributeResponse {
    pub message: String,
    pub report: DistributionReport,
}

#[instrument(skip(state))]
pub async fn distribute_diaries(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<DistributeQuery>,
) -> Result<Json<DistributeResponse>, AppError> {
    let date = match q.date.as_deref() {
        Some(raw) => parse_date(raw).map_err(|e| AppError::BadRequest(format!("{e:#}")))?,
        None => today_utc(),
    };

    let report = distribute(state.store.as_ref(), &state.selection_policy(), date).await?;
    Ok(Json(DistributeResponse {
        message: "Diary distribution completed".into(),
        report,
    }))
}
