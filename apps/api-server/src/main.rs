//! # Cadence API Server
//!
//! The main entry point for the Actix-web HTTP server and the sweep scheduler.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

use cadence_core::ports::TokenService;
use cadence_infra::JwtTokenService;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Cadence API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config).await?;
    let token_service: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(config.jwt.clone()));

    let app_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(token_service.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run();

    // Only sweep once the listener is up.
    state.scheduler.start().await?;

    let served = server.await;

    // The server has drained; let an in-flight sweep finish before exiting.
    state.scheduler.stop().await;

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
