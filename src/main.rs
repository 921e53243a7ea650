mod app;
mod auth;
mod config;
mod error;
mod state;

use anyhow::Context;

use crate::{auth::services, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gatekeep=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("load configuration")?;
    let (app_state, db) = AppState::init(config).await?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run database migrations")?;

    if let Some(admin) = app_state.config.bootstrap_admin.as_ref() {
        services::bootstrap_admin(&app_state, admin)
            .await
            .context("ensure bootstrap admin")?;
    }

    app::serve(app::build_app(app_state)).await
}
