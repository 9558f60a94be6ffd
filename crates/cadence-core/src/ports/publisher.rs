//! Publication port - the external surface posts are published to.

use async_trait::async_trait;

use crate::domain::Post;

/// Result of a publish call that reached the publishing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { external_id: String },
    Rejected { reason: String },
}

/// Publisher trait - abstraction over publishing backends.
///
/// Implementations never touch the post store. An ordinary rejection is an
/// `Ok(PublishOutcome::Rejected)`; `Err` is reserved for infrastructure trouble.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError>;
}

/// Publisher infrastructure errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publishing service unavailable: {0}")]
    Unavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
