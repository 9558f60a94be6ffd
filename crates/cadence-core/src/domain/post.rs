use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::retry::RetryPolicy;
use crate::error::DomainError;

/// Lifecycle state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown post status: {other}"
            ))),
        }
    }
}

/// Lease held by a sweep cycle while it publishes a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Claim {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// What happened to a post after the publishing surface rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOutcome {
    /// Still scheduled, will be picked up by a later sweep.
    Retrying,
    /// Retry budget spent, moved to `Failed`.
    Exhausted,
}

/// Post entity - a piece of content that can be scheduled for publication.
///
/// `scheduled_for` is set if and only if `status` is [`PostStatus::Scheduled`].
/// Every mutating method below keeps that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
    pub publish_attempts: u32,
    pub retry_after: Option<DateTime<Utc>>,
    pub claim: Option<Claim>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new draft post.
    pub fn new(user_id: Uuid, title: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            content,
            status: PostStatus::Draft,
            scheduled_for: None,
            published_at: None,
            external_post_id: None,
            error_message: None,
            publish_attempts: 0,
            retry_after: None,
            claim: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claim.is_some_and(|c| c.is_active(now))
    }

    /// Whether a sweep running at `now` may pick this post up.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled
            && self.scheduled_for.is_some_and(|at| at <= now)
            && self.retry_after.is_none_or(|at| at <= now)
            && !self.is_claimed(now)
    }

    /// Status and claim checks shared by every scheduling entry point.
    pub fn check_can_schedule(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !matches!(self.status, PostStatus::Draft | PostStatus::Scheduled) {
            return Err(DomainError::InvalidTransition {
                status: self.status,
                action: "schedule",
            });
        }
        if self.is_claimed(now) {
            return Err(DomainError::PublishInProgress(self.id));
        }
        Ok(())
    }

    /// Schedule (or reschedule) the post for `at`.
    pub fn schedule(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.check_can_schedule(now)?;
        if at <= now {
            return Err(DomainError::InPast { requested: at });
        }

        self.status = PostStatus::Scheduled;
        self.scheduled_for = Some(at);
        self.error_message = None;
        self.publish_attempts = 0;
        self.retry_after = None;
        self.updated_at = now;
        Ok(())
    }

    /// Revert a scheduled post to draft.
    pub fn unschedule(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != PostStatus::Scheduled {
            return Err(DomainError::InvalidTransition {
                status: self.status,
                action: "unschedule",
            });
        }
        if self.is_claimed(now) {
            return Err(DomainError::PublishInProgress(self.id));
        }

        self.status = PostStatus::Draft;
        self.scheduled_for = None;
        self.retry_after = None;
        self.updated_at = now;
        Ok(())
    }

    /// Replace the title and/or the content. Refused while a sweep holds the post.
    pub fn edit(
        &mut self,
        title: Option<String>,
        content: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.is_claimed(now) {
            return Err(DomainError::PublishInProgress(self.id));
        }
        if title.is_none() && content.is_none() {
            return Ok(());
        }

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = content {
            self.content = content;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_published(&mut self, external_id: String, at: DateTime<Utc>) {
        self.status = PostStatus::Published;
        self.scheduled_for = None;
        self.published_at = Some(at);
        self.external_post_id = Some(external_id);
        self.error_message = None;
        self.retry_after = None;
        self.updated_at = at;
    }

    /// Record a rejected publish attempt and apply the retry policy.
    pub fn record_rejection(
        &mut self,
        reason: String,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> RejectionOutcome {
        self.publish_attempts = self.publish_attempts.saturating_add(1);
        self.updated_at = now;

        if policy.is_exhausted(self.publish_attempts) {
            self.status = PostStatus::Failed;
            self.scheduled_for = None;
            self.retry_after = None;
            self.error_message = Some(format!(
                "{reason} (gave up after {} attempts)",
                self.publish_attempts
            ));
            return RejectionOutcome::Exhausted;
        }

        self.error_message = Some(reason);
        self.retry_after = policy.next_attempt_at(now);
        RejectionOutcome::Retrying
    }

    /// Record an infrastructure error. Does not consume the retry budget.
    pub fn record_publish_error(&mut self, message: String, now: DateTime<Utc>) {
        self.error_message = Some(message);
        self.updated_at = now;
    }
}
