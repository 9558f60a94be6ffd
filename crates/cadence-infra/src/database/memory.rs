//! In-memory post store - used when no database is configured and in tests.
//!
//! Note: Data is lost on process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use cadence_core::domain::{Claim, Post, PostStatus};
use cadence_core::error::RepoError;
use cadence_core::ports::{BaseRepository, PostFilter, PostRepository, ScheduleStats};

/// In-memory post store using a HashMap behind an async RwLock.
///
/// Every trait method takes the lock once, so claims and batch commits are
/// atomic with respect to each other.
pub struct InMemoryPostRepository {
    store: RwLock<HashMap<Uuid, Post>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    fn sort_by_schedule(posts: &mut [Post]) {
        posts.sort_by_key(|p| (p.scheduled_for, p.id));
    }

    fn is_overdue(post: &Post, now: DateTime<Utc>) -> bool {
        post.status == PostStatus::Scheduled && post.scheduled_for.is_some_and(|at| at <= now)
    }
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.store.read().await.get(&id).cloned())
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let mut store = self.store.write().await;
        if store.contains_key(&post.id) {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }
        store.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.store
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>, RepoError> {
        let store = self.store.read().await;
        let mut posts: Vec<Post> = store.values().filter(|p| filter.matches(p)).cloned().collect();
        if filter.orders_by_schedule() {
            Self::sort_by_schedule(&mut posts);
        } else {
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        }
        Ok(posts)
    }

    async fn update_unclaimed(&self, post: Post, now: DateTime<Utc>) -> Result<Post, RepoError> {
        let mut store = self.store.write().await;
        let current = store.get_mut(&post.id).ok_or(RepoError::NotFound)?;
        if current.is_claimed(now) {
            return Err(RepoError::Conflict(format!(
                "post {} is claimed by a sweep",
                post.id
            )));
        }

        let mut post = post;
        post.claim = None;
        *current = post.clone();
        Ok(post)
    }

    async fn delete_unclaimed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        let current = store.get(&id).ok_or(RepoError::NotFound)?;
        if current.is_claimed(now) {
            return Err(RepoError::Conflict(format!("post {id} is claimed by a sweep")));
        }

        store.remove(&id);
        Ok(())
    }

    async fn claim_due(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let mut store = self.store.write().await;

        let mut due: Vec<Post> = store.values().filter(|p| p.is_due(now)).cloned().collect();
        Self::sort_by_schedule(&mut due);
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        let claim = Claim {
            token,
            expires_at: lease_until,
        };
        for post in due.iter_mut() {
            post.claim = Some(claim);
            if let Some(stored) = store.get_mut(&post.id) {
                stored.claim = Some(claim);
            }
        }

        Ok(due)
    }

    async fn extend_claim(
        &self,
        token: Uuid,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepoError> {
        let mut store = self.store.write().await;
        let mut held = Vec::new();
        for post in store.values_mut() {
            if let Some(claim) = post.claim.as_mut().filter(|c| c.token == token) {
                claim.expires_at = lease_until;
                held.push(post.id);
            }
        }
        Ok(held)
    }

    async fn commit_claimed(&self, token: Uuid, posts: Vec<Post>) -> Result<(), RepoError> {
        let mut store = self.store.write().await;

        // Validate the whole batch before writing anything.
        for post in &posts {
            let held = store
                .get(&post.id)
                .and_then(|p| p.claim)
                .is_some_and(|c| c.token == token);
            if !held {
                return Err(RepoError::Conflict(format!(
                    "post {} is no longer held by claim {}",
                    post.id, token
                )));
            }
        }

        for mut post in posts {
            post.claim = None;
            store.insert(post.id, post);
        }
        Ok(())
    }

    async fn release_claim(&self, token: Uuid) -> Result<u64, RepoError> {
        let mut store = self.store.write().await;
        let mut released = 0;
        for post in store.values_mut() {
            if post.claim.is_some_and(|c| c.token == token) {
                post.claim = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError> {
        let store = self.store.read().await;
        let mut posts: Vec<Post> = store
            .values()
            .filter(|p| Self::is_overdue(p, now))
            .cloned()
            .collect();
        Self::sort_by_schedule(&mut posts);
        Ok(posts)
    }

    async fn schedule_stats(&self, now: DateTime<Utc>) -> Result<ScheduleStats, RepoError> {
        let horizon = now + TimeDelta::days(1);
        let store = self.store.read().await;

        let mut stats = ScheduleStats::default();
        for post in store.values().filter(|p| p.status == PostStatus::Scheduled) {
            stats.total_scheduled += 1;
            match post.scheduled_for {
                Some(at) if at <= now => stats.overdue += 1,
                Some(at) if at <= horizon => stats.upcoming_24h += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}
