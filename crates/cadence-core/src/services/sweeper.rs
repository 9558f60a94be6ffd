//! Due-post sweeper - one discovery-and-publish batch per call.
//!
//! A cycle runs in three phases:
//!
//! ```text
//! claim_due ──► publish each post (in memory) ──► commit_claimed
//!                                                   └─ on failure: release_claim, report 0
//! ```
//!
//! The claim keeps overlapping cycles (periodic loop and manual trigger) off
//! each other's posts. Before every publish call, and once more before the
//! commit, the cycle pushes its lease out by another `lease`, so a batch that
//! takes longer than one lease stays claimed. A post the cycle no longer holds
//! is skipped and left out of the commit. Nothing a cycle does is visible in
//! the store until the commit, and the commit is all or nothing.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::TimeDelta;
use uuid::Uuid;

use crate::domain::{RejectionOutcome, RetryPolicy};
use crate::error::RepoError;
use crate::ports::{Clock, PostRepository, PublishOutcome, Publisher};

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Maximum posts claimed per cycle.
    pub batch_size: u64,
    /// How long a claim shields posts from other cycles.
    pub lease: TimeDelta,
    pub retry: RetryPolicy,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            lease: TimeDelta::minutes(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Posts leased by this cycle.
    pub claimed: usize,
    /// Publish attempts that produced an outcome (`published + rejected`).
    pub processed: usize,
    pub published: usize,
    /// Rejections, including those that exhausted the retry budget.
    pub rejected: usize,
    /// Rejections that moved a post to `Failed`.
    pub exhausted: usize,
    /// Publisher infrastructure errors.
    pub errored: usize,
    /// Posts another cycle took over after this cycle's lease lapsed.
    pub lost: usize,
    /// Whether the cycle's writes reached the store.
    pub committed: bool,
}

impl SweepReport {
    fn idle() -> Self {
        Self {
            committed: true,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.claimed == 0
    }
}

/// Errors that abort a cycle before any post is touched.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Failed to claim due posts: {0}")]
    Claim(#[from] RepoError),
}

/// Finds due posts and drives them through the publisher.
pub struct DueSweeper {
    posts: Arc<dyn PostRepository>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl DueSweeper {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            posts,
            publisher,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Run one sweep cycle.
    ///
    /// Only a failure to claim is returned as an error. A failed commit is
    /// rolled back and reported as a cycle with zero processed posts.
    pub async fn run_cycle(&self) -> Result<SweepReport, SweepError> {
        let now = self.clock.now();
        let token = Uuid::new_v4();

        let mut batch = self
            .posts
            .claim_due(token, now, now + self.config.lease, self.config.batch_size)
            .await?;

        if batch.is_empty() {
            tracing::debug!("No due posts found");
            return Ok(SweepReport::idle());
        }

        tracing::info!(claim = %token, claimed = batch.len(), "Processing due posts");

        let mut report = SweepReport {
            claimed: batch.len(),
            ..SweepReport::default()
        };

        for post in batch.iter_mut() {
            let held = match self.heartbeat(token).await {
                Ok(held) => held,
                Err(e) => {
                    tracing::error!(claim = %token, error = %e, "Failed to extend claim, stopping batch");
                    break;
                }
            };
            if !held.contains(&post.id) {
                tracing::warn!(post_id = %post.id, claim = %token, "Claim lost, skipping post");
                continue;
            }

            match self.publisher.publish(post).await {
                Ok(PublishOutcome::Published { external_id }) => {
                    tracing::info!(post_id = %post.id, external_id = %external_id, "Post published");
                    post.mark_published(external_id, now);
                    report.published += 1;
                }
                Ok(PublishOutcome::Rejected { reason }) => {
                    let outcome = post.record_rejection(reason, &self.config.retry, now);
                    report.rejected += 1;
                    match outcome {
                        RejectionOutcome::Retrying => tracing::warn!(
                            post_id = %post.id,
                            attempts = post.publish_attempts,
                            "Post failed to publish, will retry"
                        ),
                        RejectionOutcome::Exhausted => {
                            report.exhausted += 1;
                            tracing::error!(
                                post_id = %post.id,
                                attempts = post.publish_attempts,
                                "Post failed to publish, giving up"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(post_id = %post.id, error = %e, "Error processing post");
                    post.record_publish_error(e.to_string(), now);
                    report.errored += 1;
                }
            }
        }

        // Only posts still held by this cycle can be committed.
        let held = match self.heartbeat(token).await {
            Ok(held) => held,
            Err(e) => {
                tracing::error!(claim = %token, error = %e, "Failed to extend claim before commit");
                batch.iter().map(|p| p.id).collect()
            }
        };
        let before = batch.len();
        batch.retain(|p| held.contains(&p.id));
        report.lost = before - batch.len();
        if report.lost > 0 {
            tracing::error!(claim = %token, lost = report.lost, "Posts were taken over by another cycle");
        }
        report.processed = report.published + report.rejected;

        if let Err(e) = self.posts.commit_claimed(token, batch).await {
            tracing::error!(claim = %token, error = %e, "Failed to commit sweep, rolling back");
            if let Err(release_err) = self.posts.release_claim(token).await {
                tracing::warn!(
                    claim = %token,
                    error = %release_err,
                    "Failed to release claim, posts stay leased until it expires"
                );
            }
            return Ok(SweepReport {
                claimed: report.claimed,
                lost: report.lost,
                ..SweepReport::default()
            });
        }

        report.committed = true;
        tracing::info!(
            processed = report.processed,
            published = report.published,
            rejected = report.rejected,
            errored = report.errored,
            "Sweep committed"
        );
        Ok(report)
    }

    /// Extend this cycle's lease from the current time. Returns the posts still held.
    async fn heartbeat(&self, token: Uuid) -> Result<HashSet<Uuid>, RepoError> {
        let until = self.clock.now() + self.config.lease;
        let held = self.posts.extend_claim(token, until).await?;
        Ok(held.into_iter().collect())
    }
}
