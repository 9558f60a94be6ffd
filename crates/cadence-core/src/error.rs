//! Domain-level error types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::PostStatus;

/// Domain errors - business logic failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot {action} post with status: {status}")]
    InvalidTransition {
        status: PostStatus,
        action: &'static str,
    },

    #[error("Cannot schedule post in the past ({requested})")]
    InPast { requested: DateTime<Utc> },

    #[error("Post {0} is currently being published")]
    PublishInProgress(Uuid),

    #[error("Not allowed to manage this post")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl DomainError {
    pub fn post_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity_type: "Post",
            id,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidInput(_) => "invalid_input",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::InPast { .. } => "in_past",
            DomainError::PublishInProgress(_) => "publish_in_progress",
            DomainError::Forbidden => "forbidden",
            DomainError::Repository(_) => "repository_error",
        }
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A conditional write lost against a concurrent claim.
    #[error("Write conflict: {0}")]
    Conflict(String),
}
