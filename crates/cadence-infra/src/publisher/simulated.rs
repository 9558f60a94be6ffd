//! Simulated publisher - stands in for a real social platform.
//!
//! Waits a fixed latency, then succeeds or rejects at random. Used when no
//! outbound endpoint is configured and in local development.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use cadence_core::domain::Post;
use cadence_core::ports::{PublishError, PublishOutcome, Publisher};

const REJECTION_REASON: &str = "Failed to publish to external platform";

/// Configuration for simulated publishing.
#[derive(Debug, Clone)]
pub struct SimulatedPublisherConfig {
    /// Delay before each publish completes.
    pub latency: Duration,
    /// Probability in `[0, 1]` that a publish is rejected.
    pub failure_rate: f64,
}

impl Default for SimulatedPublisherConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(200),
            failure_rate: 0.05,
        }
    }
}

pub struct SimulatedPublisher {
    latency: Duration,
    failure_rate: f64,
}

impl SimulatedPublisher {
    pub fn new(config: SimulatedPublisherConfig) -> Self {
        let failure_rate = if config.failure_rate.is_finite() {
            config.failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if failure_rate != config.failure_rate {
            tracing::warn!(
                requested = config.failure_rate,
                applied = failure_rate,
                "Simulated failure rate out of range, clamped"
            );
        }

        Self {
            latency: config.latency,
            failure_rate,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

impl Default for SimulatedPublisher {
    fn default() -> Self {
        Self::new(SimulatedPublisherConfig::default())
    }
}

#[async_trait]
impl Publisher for SimulatedPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        tracing::debug!(post_id = %post.id, title = %post.title, "Publishing post (simulated)");

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let rejected = rand::thread_rng().gen_bool(self.failure_rate);
        if rejected {
            return Ok(PublishOutcome::Rejected {
                reason: REJECTION_REASON.to_string(),
            });
        }

        Ok(PublishOutcome::Published {
            external_id: format!("sim_{}_{}", post.id.simple(), Utc::now().timestamp()),
        })
    }
}
