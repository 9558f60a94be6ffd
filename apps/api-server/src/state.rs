//! Application state - shared across all handlers.

use std::sync::Arc;

use anyhow::Context;

use cadence_core::ports::{Clock, PostRepository, Publisher, SystemClock};
use cadence_core::services::{DueSweeper, SchedulingService, SweeperConfig};
use cadence_infra::{InMemoryPostRepository, SimulatedPublisher, SimulatedPublisherConfig};

#[cfg(feature = "postgres")]
use cadence_infra::{DatabaseConnections, PostgresPostRepository};

#[cfg(feature = "http-publisher")]
use cadence_infra::{HttpPublisher, HttpPublisherConfig};

use crate::background::{Scheduler, SchedulerConfig};
use crate::config::{AppConfig, PublisherKind, PublisherSettings};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostRepository>,
    pub scheduling: Arc<SchedulingService>,
    pub scheduler: Arc<Scheduler>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let posts = build_post_store(config).await?;
        let publisher = build_publisher(&config.publisher)?;

        let state = Self::from_parts(
            posts,
            publisher,
            Arc::new(SystemClock),
            config.sweeper.clone(),
            config.scheduler.clone(),
        );

        tracing::info!("Application state initialized");
        Ok(state)
    }

    /// Wire services from already-built adapters.
    pub fn from_parts(
        posts: Arc<dyn PostRepository>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        sweeper_config: SweeperConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let scheduling = Arc::new(SchedulingService::new(posts.clone(), clock.clone()));
        let sweeper = Arc::new(DueSweeper::new(
            posts.clone(),
            publisher,
            clock.clone(),
            sweeper_config,
        ));
        let scheduler = Arc::new(Scheduler::new(sweeper, scheduler_config));

        Self {
            posts,
            scheduling,
            scheduler,
            clock,
        }
    }
}

#[cfg(feature = "postgres")]
async fn build_post_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PostRepository>> {
    let Some(db_config) = config.database.as_ref() else {
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        return Ok(Arc::new(InMemoryPostRepository::new()));
    };

    let connections = DatabaseConnections::init(db_config)
        .await
        .context("failed to connect to database")?;
    Ok(Arc::new(PostgresPostRepository::new(connections.main)))
}

#[cfg(not(feature = "postgres"))]
async fn build_post_store(_config: &AppConfig) -> anyhow::Result<Arc<dyn PostRepository>> {
    tracing::info!("Running without postgres feature - using in-memory post store");
    Ok(Arc::new(InMemoryPostRepository::new()))
}

fn build_publisher(settings: &PublisherSettings) -> anyhow::Result<Arc<dyn Publisher>> {
    match settings.kind {
        PublisherKind::Simulated => {
            tracing::info!(
                latency_ms = settings.latency.as_millis() as u64,
                failure_rate = settings.failure_rate,
                "Using simulated publisher"
            );
            Ok(Arc::new(SimulatedPublisher::new(SimulatedPublisherConfig {
                latency: settings.latency,
                failure_rate: settings.failure_rate,
            })))
        }
        PublisherKind::Http => build_http_publisher(settings),
    }
}

#[cfg(feature = "http-publisher")]
fn build_http_publisher(settings: &PublisherSettings) -> anyhow::Result<Arc<dyn Publisher>> {
    let base_url = settings
        .url
        .clone()
        .context("PUBLISHER_URL is required when PUBLISHER_KIND=http")?;

    tracing::info!(base_url = %base_url, "Using HTTP publisher");
    let publisher = HttpPublisher::new(HttpPublisherConfig {
        base_url,
        timeout: settings.timeout,
    })?;
    Ok(Arc::new(publisher))
}

#[cfg(not(feature = "http-publisher"))]
fn build_http_publisher(_settings: &PublisherSettings) -> anyhow::Result<Arc<dyn Publisher>> {
    anyhow::bail!("PUBLISHER_KIND=http requires the http-publisher feature")
}
