//! Post entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use cadence_core::domain::{Claim, Post, PostStatus};

/// Stored form of [`PostStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum DbPostStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl From<PostStatus> for DbPostStatus {
    fn from(status: PostStatus) -> Self {
        match status {
            PostStatus::Draft => Self::Draft,
            PostStatus::Scheduled => Self::Scheduled,
            PostStatus::Published => Self::Published,
            PostStatus::Failed => Self::Failed,
        }
    }
}

impl From<DbPostStatus> for PostStatus {
    fn from(status: DbPostStatus) -> Self {
        match status {
            DbPostStatus::Draft => Self::Draft,
            DbPostStatus::Scheduled => Self::Scheduled,
            DbPostStatus::Published => Self::Published,
            DbPostStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub status: DbPostStatus,
    pub scheduled_for: Option<DateTimeWithTimeZone>,
    pub published_at: Option<DateTimeWithTimeZone>,
    pub external_post_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub publish_attempts: i32,
    pub retry_after: Option<DateTimeWithTimeZone>,
    pub claim_token: Option<Uuid>,
    pub claim_expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Conversion from SeaORM Model to Domain Post.
impl From<Model> for Post {
    fn from(model: Model) -> Self {
        let claim = match (model.claim_token, model.claim_expires_at) {
            (Some(token), Some(expires_at)) => Some(Claim {
                token,
                expires_at: expires_at.into(),
            }),
            _ => None,
        };

        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            content: model.content,
            status: model.status.into(),
            scheduled_for: model.scheduled_for.map(Into::into),
            published_at: model.published_at.map(Into::into),
            external_post_id: model.external_post_id,
            error_message: model.error_message,
            publish_attempts: u32::try_from(model.publish_attempts).unwrap_or(0),
            retry_after: model.retry_after.map(Into::into),
            claim,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// Conversion from Domain Post to SeaORM ActiveModel.
impl From<Post> for ActiveModel {
    fn from(post: Post) -> Self {
        Self {
            id: Set(post.id),
            user_id: Set(post.user_id),
            title: Set(post.title),
            content: Set(post.content),
            status: Set(post.status.into()),
            scheduled_for: Set(post.scheduled_for.map(Into::into)),
            published_at: Set(post.published_at.map(Into::into)),
            external_post_id: Set(post.external_post_id),
            error_message: Set(post.error_message),
            publish_attempts: Set(i32::try_from(post.publish_attempts).unwrap_or(i32::MAX)),
            retry_after: Set(post.retry_after.map(Into::into)),
            claim_token: Set(post.claim.map(|c| c.token)),
            claim_expires_at: Set(post.claim.map(|c| c.expires_at.into())),
            created_at: Set(post.created_at.into()),
            updated_at: Set(post.updated_at.into()),
        }
    }
}
