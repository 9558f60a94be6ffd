//! Scheduling engine - user-driven post state transitions.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{Post, PostStatus};
use crate::error::{DomainError, RepoError};
use crate::ports::{BaseRepository, Clock, PostRepository, ScheduleStats};

/// Compose a UTC timestamp from a `YYYY-MM-DD` date and an hour/minute pair.
pub fn compose_timestamp(date: &str, hour: i32, minute: i32) -> Result<DateTime<Utc>, DomainError> {
    if !(0..=23).contains(&hour) {
        return Err(DomainError::InvalidInput(
            "Hour must be between 0-23".to_string(),
        ));
    }
    if !(0..=59).contains(&minute) {
        return Err(DomainError::InvalidInput(
            "Minute must be between 0-59".to_string(),
        ));
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
        DomainError::InvalidInput("Invalid date format. Use YYYY-MM-DD".to_string())
    })?;

    // Both components were range-checked above.
    day.and_hms_opt(hour as u32, minute as u32, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DomainError::InvalidInput("Invalid time of day".to_string()))
}

/// Requested change to a post's schedule as part of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChange {
    /// Schedule (or reschedule) for this instant.
    At(DateTime<Utc>),
    /// Drop the schedule. A post that is not scheduled is left as it is.
    Clear,
}

/// Partial update of a post. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub schedule: Option<ScheduleChange>,
}

/// Validates and applies schedule/unschedule transitions.
///
/// Every validation runs before the single write, so a failed call leaves
/// the store untouched.
pub struct SchedulingService {
    posts: Arc<dyn PostRepository>,
    clock: Arc<dyn Clock>,
}

impl SchedulingService {
    pub fn new(posts: Arc<dyn PostRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { posts, clock }
    }

    /// Schedule a post for `date` at `hour:minute` UTC.
    pub async fn schedule(
        &self,
        post_id: Uuid,
        date: &str,
        hour: i32,
        minute: i32,
    ) -> Result<Post, DomainError> {
        let now = self.clock.now();
        let mut post = self.load(post_id).await?;

        post.check_can_schedule(now)?;
        let at = compose_timestamp(date, hour, minute)?;
        post.schedule(at, now)?;

        let saved = self.persist(post, now).await?;
        tracing::info!(post_id = %post_id, scheduled_for = %at, "Post scheduled");
        Ok(saved)
    }

    /// Schedule a post for an exact timestamp.
    pub async fn schedule_at(&self, post_id: Uuid, at: DateTime<Utc>) -> Result<Post, DomainError> {
        let now = self.clock.now();
        let mut post = self.load(post_id).await?;

        post.schedule(at, now)?;

        let saved = self.persist(post, now).await?;
        tracing::info!(post_id = %post_id, scheduled_for = %at, "Post scheduled");
        Ok(saved)
    }

    /// Revert a scheduled post to draft.
    pub async fn unschedule(&self, post_id: Uuid) -> Result<Post, DomainError> {
        let now = self.clock.now();
        let mut post = self.load(post_id).await?;

        post.unschedule(now)?;

        let saved = self.persist(post, now).await?;
        tracing::info!(post_id = %post_id, "Post unscheduled");
        Ok(saved)
    }

    /// Apply a partial update, schedule change included, in one write.
    pub async fn edit(&self, post_id: Uuid, edit: PostEdit) -> Result<Post, DomainError> {
        let now = self.clock.now();
        let mut post = self.load(post_id).await?;

        match edit.schedule {
            Some(ScheduleChange::At(at)) => post.schedule(at, now)?,
            Some(ScheduleChange::Clear) if post.status == PostStatus::Scheduled => {
                post.unschedule(now)?
            }
            _ => {}
        }
        post.edit(edit.title, edit.content, now)?;

        let saved = self.persist(post, now).await?;
        tracing::info!(post_id = %post_id, status = %saved.status, "Post updated");
        Ok(saved)
    }

    pub async fn due_stats(&self) -> Result<ScheduleStats, DomainError> {
        Ok(self.posts.schedule_stats(self.clock.now()).await?)
    }

    pub async fn overdue(&self) -> Result<Vec<Post>, DomainError> {
        Ok(self.posts.find_overdue(self.clock.now()).await?)
    }

    async fn load(&self, post_id: Uuid) -> Result<Post, DomainError> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(post_id))
    }

    async fn persist(&self, post: Post, now: DateTime<Utc>) -> Result<Post, DomainError> {
        let id = post.id;
        self.posts
            .update_unclaimed(post, now)
            .await
            .map_err(|e| match e {
                RepoError::Conflict(_) => DomainError::PublishInProgress(id),
                RepoError::NotFound => DomainError::post_not_found(id),
                other => DomainError::Repository(other),
            })
    }
}
