//! End-to-end scheduling and sweep scenarios against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use uuid::Uuid;

use cadence_core::DomainError;
use cadence_core::domain::{Post, PostStatus, RetryPolicy};
use cadence_core::error::RepoError;
use cadence_core::ports::{
    BaseRepository, Clock, ManualClock, PostFilter, PostRepository, PublishError, PublishOutcome,
    Publisher, ScheduleStats,
};
use cadence_core::services::{
    DueSweeper, PostEdit, ScheduleChange, SchedulingService, SweepReport, SweeperConfig,
};
use cadence_infra::InMemoryPostRepository;

struct AlwaysPublish;

#[async_trait]
impl Publisher for AlwaysPublish {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        Ok(PublishOutcome::Published {
            external_id: format!("ext_{}", post.id.simple()),
        })
    }
}

struct AlwaysReject;

#[async_trait]
impl Publisher for AlwaysReject {
    async fn publish(&self, _post: &Post) -> Result<PublishOutcome, PublishError> {
        Ok(PublishOutcome::Rejected {
            reason: "Failed to publish to external platform".into(),
        })
    }
}

struct Unreachable;

#[async_trait]
impl Publisher for Unreachable {
    async fn publish(&self, _post: &Post) -> Result<PublishOutcome, PublishError> {
        Err(PublishError::Transport("connection refused".into()))
    }
}

/// Counts calls and holds each publish open for a while.
struct SlowCounting {
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl Publisher for SlowCounting {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(PublishOutcome::Published {
            external_id: format!("slow_{}", post.id.simple()),
        })
    }
}

/// Counts calls and always publishes.
struct Counting {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Publisher for Counting {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PublishOutcome::Published {
            external_id: format!("count_{}", post.id.simple()),
        })
    }
}

/// Every publish takes `step` of clock time. While it is in flight a second
/// sweeper runs a full cycle against the same store.
struct LongPublish {
    clock: Arc<ManualClock>,
    step: TimeDelta,
    calls: Arc<AtomicUsize>,
    rival: DueSweeper,
    rival_reports: Mutex<Vec<SweepReport>>,
}

#[async_trait]
impl Publisher for LongPublish {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.clock.advance(self.step);
        let report = self.rival.run_cycle().await.unwrap();
        self.rival_reports.lock().unwrap().push(report);
        Ok(PublishOutcome::Published {
            external_id: format!("long_{}", post.id.simple()),
        })
    }
}

/// Tries to delete another claimed post while publishing.
struct DeletesDuringPublish {
    repo: Arc<InMemoryPostRepository>,
    clock: Arc<ManualClock>,
    victim: Uuid,
    delete_results: Mutex<Vec<Result<(), RepoError>>>,
}

#[async_trait]
impl Publisher for DeletesDuringPublish {
    async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
        if post.id != self.victim {
            let result = self
                .repo
                .delete_unclaimed(self.victim, self.clock.now())
                .await;
            self.delete_results.lock().unwrap().push(result);
        }
        Ok(PublishOutcome::Published {
            external_id: format!("del_{}", post.id.simple()),
        })
    }
}

/// Store whose batch commit always fails.
struct FailingCommit(InMemoryPostRepository);

#[async_trait]
impl BaseRepository<Post, Uuid> for FailingCommit {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        self.0.find_by_id(id).await
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        self.0.insert(post).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.0.delete(id).await
    }
}

#[async_trait]
impl PostRepository for FailingCommit {
    async fn find_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>, RepoError> {
        self.0.find_by_filter(filter).await
    }

    async fn update_unclaimed(&self, post: Post, now: DateTime<Utc>) -> Result<Post, RepoError> {
        self.0.update_unclaimed(post, now).await
    }

    async fn delete_unclaimed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepoError> {
        self.0.delete_unclaimed(id, now).await
    }

    async fn claim_due(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError> {
        self.0.claim_due(token, now, lease_until, limit).await
    }

    async fn extend_claim(
        &self,
        token: Uuid,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepoError> {
        self.0.extend_claim(token, lease_until).await
    }

    async fn commit_claimed(&self, _token: Uuid, _posts: Vec<Post>) -> Result<(), RepoError> {
        Err(RepoError::Query("disk full".into()))
    }

    async fn release_claim(&self, token: Uuid) -> Result<u64, RepoError> {
        self.0.release_claim(token).await
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError> {
        self.0.find_overdue(now).await
    }

    async fn schedule_stats(&self, now: DateTime<Utc>) -> Result<ScheduleStats, RepoError> {
        self.0.schedule_stats(now).await
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

struct Harness {
    repo: Arc<InMemoryPostRepository>,
    clock: Arc<ManualClock>,
    scheduling: SchedulingService,
}

impl Harness {
    fn new() -> Self {
        let repo = Arc::new(InMemoryPostRepository::new());
        let clock = Arc::new(ManualClock::new(start()));
        let scheduling = SchedulingService::new(repo.clone(), clock.clone());
        Self {
            repo,
            clock,
            scheduling,
        }
    }

    fn sweeper(&self, publisher: Arc<dyn Publisher>) -> DueSweeper {
        DueSweeper::new(
            self.repo.clone(),
            publisher,
            self.clock.clone(),
            SweeperConfig::default(),
        )
    }

    async fn draft(&self) -> Post {
        let post = Post::new(Uuid::new_v4(), "Launch".into(), "We are live".into());
        self.repo.insert(post).await.unwrap()
    }

    /// A post that was scheduled earlier and is now `ago` overdue.
    async fn overdue(&self, ago: TimeDelta) -> Post {
        let mut post = Post::new(Uuid::new_v4(), "Launch".into(), "We are live".into());
        let now = self.clock.now();
        post.schedule(now - ago, now - ago - TimeDelta::days(1))
            .unwrap();
        self.repo.insert(post).await.unwrap()
    }

    async fn get(&self, id: Uuid) -> Post {
        self.repo.find_by_id(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn schedule_then_past_date_leaves_post_untouched() {
    let h = Harness::new();
    let post = h.draft().await;

    let scheduled = h
        .scheduling
        .schedule(post.id, "2099-01-01", 9, 0)
        .await
        .unwrap();
    assert_eq!(scheduled.status, PostStatus::Scheduled);
    assert_eq!(
        scheduled.scheduled_for,
        Some(Utc.with_ymd_and_hms(2099, 1, 1, 9, 0, 0).unwrap())
    );

    let err = h
        .scheduling
        .schedule(post.id, "2020-01-01", 9, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InPast { .. }));

    let stored = h.get(post.id).await;
    assert_eq!(stored.status, PostStatus::Scheduled);
    assert_eq!(stored.scheduled_for, scheduled.scheduled_for);
}

#[tokio::test]
async fn validation_runs_status_before_time_fields() {
    let h = Harness::new();
    let mut post = h.draft().await;
    post.mark_published("ext".into(), h.clock.now());
    let post = h.repo.update_unclaimed(post, h.clock.now()).await.unwrap();

    let err = h
        .scheduling
        .schedule(post.id, "not-a-date", 99, 0)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DomainError::InvalidTransition {
            status: PostStatus::Published,
            ..
        }
    ));
    assert_eq!(h.get(post.id).await.status, PostStatus::Published);
}

#[tokio::test]
async fn schedule_unknown_post_is_not_found() {
    let h = Harness::new();

    let err = h
        .scheduling
        .schedule(Uuid::new_v4(), "2099-01-01", 9, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn unschedule_round_trip() {
    let h = Harness::new();
    let post = h.draft().await;

    assert!(h.scheduling.unschedule(post.id).await.is_err());

    h.scheduling
        .schedule(post.id, "2099-01-01", 9, 0)
        .await
        .unwrap();
    let draft = h.scheduling.unschedule(post.id).await.unwrap();

    assert_eq!(draft.status, PostStatus::Draft);
    assert!(draft.scheduled_for.is_none());
}

#[tokio::test]
async fn successful_sweep_publishes_once() {
    let h = Harness::new();
    let post = h.overdue(TimeDelta::hours(1)).await;
    let sweeper = h.sweeper(Arc::new(AlwaysPublish));

    let report = sweeper.run_cycle().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.published, 1);
    assert!(report.committed);

    let published = h.get(post.id).await;
    assert_eq!(published.status, PostStatus::Published);
    assert_eq!(published.published_at, Some(h.clock.now()));
    assert!(!published.external_post_id.clone().unwrap_or_default().is_empty());
    assert!(published.scheduled_for.is_none());
    assert!(published.claim.is_none());

    h.clock.advance(TimeDelta::minutes(1));
    let second = sweeper.run_cycle().await.unwrap();
    assert_eq!(second.processed, 0);
    assert!(second.is_idle());

    let after = h.get(post.id).await;
    assert_eq!(after.updated_at, published.updated_at);
    assert_eq!(after.published_at, published.published_at);
}

#[tokio::test]
async fn rejected_post_stays_due_until_budget_is_spent() {
    let h = Harness::new();
    let post = h.overdue(TimeDelta::hours(1)).await;
    let sweeper = h.sweeper(Arc::new(AlwaysReject));
    let budget = RetryPolicy::default().max_attempts.unwrap();

    let first = sweeper.run_cycle().await.unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(first.rejected, 1);

    let after_first = h.get(post.id).await;
    assert_eq!(after_first.status, PostStatus::Scheduled);
    assert!(!after_first.error_message.clone().unwrap_or_default().is_empty());
    assert!(after_first.is_due(h.clock.now()));
    assert_eq!(h.scheduling.overdue().await.unwrap().len(), 1);

    for _ in 1..budget {
        sweeper.run_cycle().await.unwrap();
    }

    let failed = h.get(post.id).await;
    assert_eq!(failed.status, PostStatus::Failed);
    assert_eq!(failed.publish_attempts, budget);
    assert!(failed.scheduled_for.is_none());

    let idle = sweeper.run_cycle().await.unwrap();
    assert!(idle.is_idle());
}

#[tokio::test]
async fn publisher_outage_does_not_consume_attempts() {
    let h = Harness::new();
    let post = h.overdue(TimeDelta::minutes(10)).await;
    let sweeper = h.sweeper(Arc::new(Unreachable));

    let report = sweeper.run_cycle().await.unwrap();

    assert_eq!(report.errored, 1);
    assert_eq!(report.processed, 0);
    let stored = h.get(post.id).await;
    assert_eq!(stored.status, PostStatus::Scheduled);
    assert_eq!(stored.publish_attempts, 0);
    assert!(stored.error_message.unwrap().contains("connection refused"));
    assert!(stored.claim.is_none());
}

#[tokio::test]
async fn sweep_ignores_future_and_unscheduled_posts() {
    let h = Harness::new();
    let draft = h.draft().await;
    let future = h.draft().await;
    h.scheduling
        .schedule_at(future.id, h.clock.now() + TimeDelta::hours(2))
        .await
        .unwrap();
    let future = h.get(future.id).await;

    let report = h.sweeper(Arc::new(AlwaysPublish)).run_cycle().await.unwrap();

    assert!(report.is_idle());
    let draft_after = h.get(draft.id).await;
    let future_after = h.get(future.id).await;
    assert_eq!(draft_after.status, PostStatus::Draft);
    assert_eq!(draft_after.updated_at, draft.updated_at);
    assert_eq!(future_after.status, PostStatus::Scheduled);
    assert_eq!(future_after.updated_at, future.updated_at);
}

#[tokio::test]
async fn failed_commit_rolls_back_and_reports_nothing_processed() {
    let repo = Arc::new(FailingCommit(InMemoryPostRepository::new()));
    let clock = Arc::new(ManualClock::new(start()));
    let mut post = Post::new(Uuid::new_v4(), "t".into(), "c".into());
    post.schedule(start() - TimeDelta::hours(1), start() - TimeDelta::days(1))
        .unwrap();
    repo.insert(post.clone()).await.unwrap();

    let sweeper = DueSweeper::new(
        repo.clone(),
        Arc::new(AlwaysPublish),
        clock,
        SweeperConfig::default(),
    );
    let report = sweeper.run_cycle().await.unwrap();

    assert_eq!(report.claimed, 1);
    assert_eq!(report.processed, 0);
    assert!(!report.committed);

    let stored = repo.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Scheduled);
    assert!(stored.claim.is_none());
    assert!(stored.external_post_id.is_none());
}

#[tokio::test]
async fn concurrent_sweeps_publish_each_post_once() {
    let h = Harness::new();
    let mut ids = Vec::new();
    for minutes in 1..=6 {
        ids.push(h.overdue(TimeDelta::minutes(minutes)).await.id);
    }
    let publisher = Arc::new(SlowCounting {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(10),
    });
    let a = h.sweeper(publisher.clone());
    let b = h.sweeper(publisher.clone());

    let (ra, rb) = tokio::join!(a.run_cycle(), b.run_cycle());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.claimed + rb.claimed, ids.len());
    assert_eq!(ra.published + rb.published, ids.len());
    assert_eq!(publisher.calls.load(Ordering::SeqCst), ids.len());
    for id in ids {
        assert_eq!(h.get(id).await.status, PostStatus::Published);
    }
}

#[tokio::test]
async fn reschedule_during_publish_is_refused() {
    let h = Harness::new();
    let post = h.overdue(TimeDelta::minutes(5)).await;
    let now = h.clock.now();
    let claimed = h
        .repo
        .claim_due(Uuid::new_v4(), now, now + TimeDelta::minutes(5), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    let err = h
        .scheduling
        .schedule(post.id, "2099-01-01", 9, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::PublishInProgress(id) if id == post.id));

    let err = h.scheduling.unschedule(post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::PublishInProgress(_)));

    // Once the lease lapses the post is editable again.
    h.clock.advance(TimeDelta::minutes(6));
    h.scheduling.unschedule(post.id).await.unwrap();
}

#[tokio::test]
async fn due_stats_bucket_scheduled_posts() {
    let h = Harness::new();
    h.overdue(TimeDelta::minutes(30)).await;
    let soon = h.draft().await;
    h.scheduling
        .schedule_at(soon.id, h.clock.now() + TimeDelta::hours(3))
        .await
        .unwrap();
    let later = h.draft().await;
    h.scheduling
        .schedule_at(later.id, h.clock.now() + TimeDelta::days(2))
        .await
        .unwrap();
    h.draft().await;

    let stats = h.scheduling.due_stats().await.unwrap();

    assert_eq!(
        stats,
        ScheduleStats {
            total_scheduled: 3,
            overdue: 1,
            upcoming_24h: 1,
        }
    );
}

#[tokio::test]
async fn batch_outliving_its_lease_keeps_posts_claimed() {
    let h = Harness::new();
    let first = h.overdue(TimeDelta::minutes(2)).await;
    let second = h.overdue(TimeDelta::minutes(1)).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lease = SweeperConfig::default().lease;

    let rival = h.sweeper(Arc::new(Counting {
        calls: calls.clone(),
    }));
    let publisher = Arc::new(LongPublish {
        clock: h.clock.clone(),
        // Two publishes together take longer than one lease.
        step: lease * 3 / 5,
        calls: calls.clone(),
        rival,
        rival_reports: Mutex::new(Vec::new()),
    });
    let report = h.sweeper(publisher.clone()).run_cycle().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(
        publisher
            .rival_reports
            .lock()
            .unwrap()
            .iter()
            .all(|r| r.claimed == 0)
    );
    assert_eq!(report.published, 2);
    assert_eq!(report.lost, 0);
    assert!(report.committed);
    for id in [first.id, second.id] {
        let stored = h.get(id).await;
        assert_eq!(stored.status, PostStatus::Published);
        assert!(stored.claim.is_none());
    }
}

#[tokio::test]
async fn lost_claim_is_left_out_of_the_commit() {
    let h = Harness::new();
    let first = h.overdue(TimeDelta::minutes(2)).await;
    let second = h.overdue(TimeDelta::minutes(1)).await;
    let calls = Arc::new(AtomicUsize::new(0));

    /// Another cycle takes over every post while the first publish is in flight.
    struct TakenOver {
        repo: Arc<InMemoryPostRepository>,
        clock: Arc<ManualClock>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Publisher for TakenOver {
        async fn publish(&self, post: &Post) -> Result<PublishOutcome, PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let later = self.clock.now() + TimeDelta::hours(1);
            self.repo
                .claim_due(Uuid::new_v4(), later, later + TimeDelta::minutes(5), 10)
                .await
                .unwrap();
            Ok(PublishOutcome::Published {
                external_id: format!("late_{}", post.id.simple()),
            })
        }
    }

    let publisher = Arc::new(TakenOver {
        repo: h.repo.clone(),
        clock: h.clock.clone(),
        calls: calls.clone(),
    });
    let report = h.sweeper(publisher).run_cycle().await.unwrap();

    // The second post is skipped once its claim is gone.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.lost, 2);
    assert!(report.committed);
    for id in [first.id, second.id] {
        let stored = h.get(id).await;
        assert_eq!(stored.status, PostStatus::Scheduled);
        assert!(stored.external_post_id.is_none());
        assert!(stored.claim.is_some());
    }
}

#[tokio::test]
async fn delete_during_publish_cannot_break_the_batch() {
    let h = Harness::new();
    let first = h.overdue(TimeDelta::minutes(2)).await;
    let victim = h.overdue(TimeDelta::minutes(1)).await;
    let publisher = Arc::new(DeletesDuringPublish {
        repo: h.repo.clone(),
        clock: h.clock.clone(),
        victim: victim.id,
        delete_results: Mutex::new(Vec::new()),
    });

    let report = h.sweeper(publisher.clone()).run_cycle().await.unwrap();

    let deletes = publisher.delete_results.lock().unwrap();
    assert_eq!(deletes.len(), 1);
    assert!(matches!(deletes[0], Err(RepoError::Conflict(_))));
    assert_eq!(report.processed, 2);
    assert!(report.committed);
    for id in [first.id, victim.id] {
        let stored = h.get(id).await;
        assert_eq!(stored.status, PostStatus::Published);
        assert!(stored.external_post_id.is_some());
    }

    // Free again once the cycle has committed.
    h.repo.delete_unclaimed(victim.id, h.clock.now()).await.unwrap();
}

#[tokio::test]
async fn edit_reschedules_and_clears_schedule() {
    let h = Harness::new();
    let post = h.draft().await;
    let at = h.clock.now() + TimeDelta::hours(4);

    let scheduled = h
        .scheduling
        .edit(
            post.id,
            PostEdit {
                title: Some("Renamed".into()),
                schedule: Some(ScheduleChange::At(at)),
                ..PostEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(scheduled.title, "Renamed");
    assert_eq!(scheduled.status, PostStatus::Scheduled);
    assert_eq!(scheduled.scheduled_for, Some(at));

    let cleared = h
        .scheduling
        .edit(
            post.id,
            PostEdit {
                schedule: Some(ScheduleChange::Clear),
                ..PostEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.status, PostStatus::Draft);
    assert!(cleared.scheduled_for.is_none());
    assert_eq!(cleared.title, "Renamed");

    // Clearing a post that is not scheduled changes nothing about its status.
    let again = h
        .scheduling
        .edit(
            post.id,
            PostEdit {
                content: Some("Fresh copy".into()),
                schedule: Some(ScheduleChange::Clear),
                ..PostEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(again.status, PostStatus::Draft);
    assert_eq!(again.content, "Fresh copy");
}

#[tokio::test]
async fn edit_with_past_schedule_writes_nothing() {
    let h = Harness::new();
    let post = h.draft().await;

    let err = h
        .scheduling
        .edit(
            post.id,
            PostEdit {
                title: Some("Should not stick".into()),
                schedule: Some(ScheduleChange::At(h.clock.now() - TimeDelta::minutes(1))),
                ..PostEdit::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::InPast { .. }));
    let stored = h.get(post.id).await;
    assert_eq!(stored.title, "Launch");
    assert_eq!(stored.status, PostStatus::Draft);
}
