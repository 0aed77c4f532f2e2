use diarydrop::{app, distribution::scheduler, state::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let app_state = AppState::init().await?;

    if let Some(hour) = app_state.config.distribution.hour_utc {
        scheduler::spawn_daily(app_state.store.clone(), app_state.selection_policy(), hour);
    } else {
        tracing::info!("DISTRIBUTION_HOUR_UTC not set; distribution runs on demand only");
    }

    let router = app::build_app(app_state);
    app::serve(router).await
}
