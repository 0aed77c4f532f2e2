pub mod engine;
mod handlers;
pub mod scheduler;
pub mod selection;

use crate::state::AppState;
use axum::{routing::post, Router};

pub use engine::{distribute, DeliveryFailure, DistributionReport};
pub use selection::{SelectionPolicy, SelectionStrategy};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/admin/distribute-diaries",
        post(handlers::distribute_diaries),
    )
}
