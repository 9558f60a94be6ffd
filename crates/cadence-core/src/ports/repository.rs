use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Post, PostStatus};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Insert a new entity.
    async fn insert(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// Filter for post listings. `None` fields match everything.
///
/// Listings filtered on [`PostStatus::Scheduled`] come back ordered by
/// `scheduled_for` ascending, every other listing newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<PostStatus>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub created_until: Option<DateTime<Utc>>,
    /// Exclusive lower bound on `scheduled_for`.
    pub scheduled_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `scheduled_for`.
    pub scheduled_until: Option<DateTime<Utc>>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        self.user_id.is_none_or(|id| post.user_id == id)
            && self.status.is_none_or(|s| post.status == s)
            && self.created_from.is_none_or(|at| post.created_at >= at)
            && self.created_until.is_none_or(|at| post.created_at <= at)
            && self
                .scheduled_after
                .is_none_or(|at| post.scheduled_for.is_some_and(|s| s > at))
            && self
                .scheduled_until
                .is_none_or(|at| post.scheduled_for.is_some_and(|s| s <= at))
    }

    pub fn orders_by_schedule(&self) -> bool {
        self.status == Some(PostStatus::Scheduled)
    }
}

/// Counts of scheduled posts relative to a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStats {
    pub total_scheduled: u64,
    pub overdue: u64,
    pub upcoming_24h: u64,
}

/// Post store.
///
/// Besides plain CRUD, the store owns the claim protocol used by the sweeper:
/// `claim_due` leases due posts to one cycle, `commit_claimed` writes that
/// cycle's outcomes in a single transaction and `release_claim` hands the
/// posts back after a failed commit.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    async fn find_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>, RepoError>;

    /// Persist a caller-driven change. Fails with [`RepoError::Conflict`] when
    /// the stored post holds a claim that is active at `now`.
    async fn update_unclaimed(&self, post: Post, now: DateTime<Utc>) -> Result<Post, RepoError>;

    /// Delete a post unless it holds a claim that is active at `now`
    /// ([`RepoError::Conflict`]).
    async fn delete_unclaimed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepoError>;

    /// Atomically lease up to `limit` due posts to `token` until `lease_until`.
    ///
    /// Returned posts are ordered by `scheduled_for` and carry the new claim.
    async fn claim_due(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError>;

    /// Push the lease of every post still held by `token` out to `lease_until`.
    ///
    /// Returns the ids still held. A post missing from the result was deleted
    /// or re-claimed by another cycle after the lease lapsed.
    async fn extend_claim(
        &self,
        token: Uuid,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepoError>;

    /// Write all posts and clear their claim, all or nothing. Fails with
    /// [`RepoError::Conflict`] if any post is no longer held by `token`.
    async fn commit_claimed(&self, token: Uuid, posts: Vec<Post>) -> Result<(), RepoError>;

    /// Drop every claim held by `token`. Returns how many posts were released.
    async fn release_claim(&self, token: Uuid) -> Result<u64, RepoError>;

    /// Scheduled posts whose target time has passed, oldest first.
    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError>;

    async fn schedule_stats(&self, now: DateTime<Utc>) -> Result<ScheduleStats, RepoError>;
}
