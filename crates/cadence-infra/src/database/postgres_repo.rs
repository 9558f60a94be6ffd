//! PostgreSQL post repository.
//!
//! Claims are taken with `SELECT ... FOR UPDATE SKIP LOCKED` so two sweepers
//! (or two API replicas) never lease the same row. The lease itself lives in
//! `claim_token`/`claim_expires_at`, which keeps it visible to the API after
//! the claiming transaction commits.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select, TransactionTrait,
};
use uuid::Uuid;

use cadence_core::domain::Post;
use cadence_core::error::RepoError;
use cadence_core::ports::{PostFilter, PostRepository, ScheduleStats};

use super::entity::post::{self, DbPostStatus, Entity as PostEntity};
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// Rows whose claim is absent or has lapsed at `now`.
fn unclaimed_at(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(post::Column::ClaimExpiresAt.is_null())
        .add(post::Column::ClaimExpiresAt.lte(now))
}

fn scheduled() -> Select<PostEntity> {
    PostEntity::find().filter(post::Column::Status.eq(DbPostStatus::Scheduled))
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>, RepoError> {
        let mut query = PostEntity::find();
        if let Some(user_id) = filter.user_id {
            query = query.filter(post::Column::UserId.eq(user_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(post::Column::Status.eq(DbPostStatus::from(status)));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(post::Column::CreatedAt.gte(from));
        }
        if let Some(until) = filter.created_until {
            query = query.filter(post::Column::CreatedAt.lte(until));
        }
        if let Some(after) = filter.scheduled_after {
            query = query.filter(post::Column::ScheduledFor.gt(after));
        }
        if let Some(until) = filter.scheduled_until {
            query = query.filter(post::Column::ScheduledFor.lte(until));
        }

        query = if filter.orders_by_schedule() {
            query.order_by_asc(post::Column::ScheduledFor)
        } else {
            query.order_by_desc(post::Column::CreatedAt)
        };

        let result = query
            .order_by_asc(post::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn update_unclaimed(&self, entity: Post, now: DateTime<Utc>) -> Result<Post, RepoError> {
        let id = entity.id;
        let mut entity = entity;
        entity.claim = None;

        let active_model: post::ActiveModel = entity.clone().into();
        let result = PostEntity::update_many()
            .set(active_model)
            .filter(post::Column::Id.eq(id))
            .filter(unclaimed_at(now))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            let exists = PostEntity::find_by_id(id)
                .one(&self.db)
                .await
                .map_err(map_db_err)?
                .is_some();
            return Err(if exists {
                RepoError::Conflict(format!("post {id} is claimed by a sweep"))
            } else {
                RepoError::NotFound
            });
        }

        Ok(entity)
    }

    async fn delete_unclaimed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepoError> {
        let result = PostEntity::delete_many()
            .filter(post::Column::Id.eq(id))
            .filter(unclaimed_at(now))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            let exists = PostEntity::find_by_id(id)
                .one(&self.db)
                .await
                .map_err(map_db_err)?
                .is_some();
            return Err(if exists {
                RepoError::Conflict(format!("post {id} is claimed by a sweep"))
            } else {
                RepoError::NotFound
            });
        }

        Ok(())
    }

    async fn claim_due(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let rows = scheduled()
            .filter(post::Column::ScheduledFor.lte(now))
            .filter(
                Condition::any()
                    .add(post::Column::RetryAfter.is_null())
                    .add(post::Column::RetryAfter.lte(now)),
            )
            .filter(unclaimed_at(now))
            .order_by_asc(post::Column::ScheduledFor)
            .order_by_asc(post::Column::Id)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await
            .map_err(map_db_err)?;

        if rows.is_empty() {
            txn.commit().await.map_err(map_db_err)?;
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
        PostEntity::update_many()
            .col_expr(post::Column::ClaimToken, Expr::value(token))
            .col_expr(post::Column::ClaimExpiresAt, Expr::value(lease_until))
            .filter(post::Column::Id.is_in(ids))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|mut model| {
                model.claim_token = Some(token);
                model.claim_expires_at = Some(lease_until.into());
                model.into()
            })
            .collect())
    }

    async fn extend_claim(
        &self,
        token: Uuid,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        // A row re-claimed by another cycle no longer carries `token`.
        PostEntity::update_many()
            .col_expr(post::Column::ClaimExpiresAt, Expr::value(lease_until))
            .filter(post::Column::ClaimToken.eq(token))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        let held: Vec<Uuid> = PostEntity::find()
            .select_only()
            .column(post::Column::Id)
            .filter(post::Column::ClaimToken.eq(token))
            .into_tuple()
            .all(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(held)
    }

    async fn commit_claimed(&self, token: Uuid, posts: Vec<Post>) -> Result<(), RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        for mut entity in posts {
            let id = entity.id;
            entity.claim = None;
            let active_model: post::ActiveModel = entity.into();

            let result = PostEntity::update_many()
                .set(active_model)
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::ClaimToken.eq(token))
                .exec(&txn)
                .await
                .map_err(map_db_err)?;

            if result.rows_affected == 0 {
                // Dropping the transaction rolls it back.
                return Err(RepoError::Conflict(format!(
                    "post {id} is no longer held by claim {token}"
                )));
            }
        }

        txn.commit().await.map_err(map_db_err)
    }

    async fn release_claim(&self, token: Uuid) -> Result<u64, RepoError> {
        let result = PostEntity::update_many()
            .col_expr(post::Column::ClaimToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                post::Column::ClaimExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(post::Column::ClaimToken.eq(token))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError> {
        let result = scheduled()
            .filter(post::Column::ScheduledFor.lte(now))
            .order_by_asc(post::Column::ScheduledFor)
            .order_by_asc(post::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn schedule_stats(&self, now: DateTime<Utc>) -> Result<ScheduleStats, RepoError> {
        let horizon = now + TimeDelta::days(1);

        let total_scheduled = scheduled().count(&self.db).await.map_err(map_db_err)?;
        let overdue = scheduled()
            .filter(post::Column::ScheduledFor.lte(now))
            .count(&self.db)
            .await
            .map_err(map_db_err)?;
        let upcoming_24h = scheduled()
            .filter(post::Column::ScheduledFor.gt(now))
            .filter(post::Column::ScheduledFor.lte(horizon))
            .count(&self.db)
            .await
            .map_err(map_db_err)?;

        tracing::debug!(total_scheduled, overdue, upcoming_24h, "Computed schedule stats");

        Ok(ScheduleStats {
            total_scheduled,
            overdue,
            upcoming_24h,
        })
    }
}
