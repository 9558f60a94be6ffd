//! HTTP publisher - forwards posts to a remote publishing endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_core::domain::Post;
use cadence_core::ports::{PublishError, PublishOutcome, Publisher};

#[derive(Debug, Clone)]
pub struct HttpPublisherConfig {
    /// Base URL of the publishing service; posts go to `<base_url>/posts`.
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    post_id: Uuid,
    title: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PublishResponse {
    id: Option<String>,
}

pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPublisher {
    pub fn new(config: HttpPublisherConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/posts", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Turn a response into an outcome. 4xx is a rejection of this post. 5xx,
/// request timeouts and rate limiting mean the service cannot take posts
/// right now.
fn classify(status: StatusCode, body: &str, post: &Post) -> Result<PublishOutcome, PublishError> {
    if status.is_success() {
        let external_id = serde_json::from_str::<PublishResponse>(body)
            .ok()
            .and_then(|r| r.id)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("http_{}_{}", post.id.simple(), Utc::now().timestamp()));
        return Ok(PublishOutcome::Published { external_id });
    }

    let transient = matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
    );
    if status.is_client_error() && !transient {
        let body = body.trim();
        let reason = if body.is_empty() {
            format!("Publishing service rejected post ({status})")
        } else {
            format!("Publishing service rejected post ({status}): {body}")
        };
        return Ok(PublishOutcome::Rejected { reason });
    }

    Err(PublishError::Unavailable(format!(
        "publishing service returned {status}"
    )))
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        tracing::debug!(post_id = %post.id, endpoint = %self.endpoint, "Publishing post");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&PublishRequest {
                post_id: post.id,
                title: &post.title,
                content: &post.content,
            })
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        classify(status, &body, post)
    }
}
