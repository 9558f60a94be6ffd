//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Request to create a post. With `scheduled_for` the post is scheduled
/// right away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Partial update of a post. Absent fields are left alone. An explicit
/// `"scheduled_for": null` clears the schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
}

/// Tells a present `null` apart from a missing field.
fn present<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(de).map(Some)
}

/// Request to schedule a post for `date` at `hour:minute` UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// `YYYY-MM-DD`
    pub date: String,
    pub hour: i32,
    pub minute: i32,
}

/// Query parameters for post listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPostsQuery {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    /// Created at or after.
    pub start_date: Option<DateTime<Utc>>,
    /// Created at or before.
    pub end_date: Option<DateTime<Utc>>,
    /// With `status=scheduled`: `true` keeps posts still ahead, `false` keeps
    /// posts already due.
    pub upcoming_only: Option<bool>,
}

/// A post as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
    pub publish_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub success: bool,
    pub message: String,
    pub post: PostResponse,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DueStats {
    pub total_scheduled: u64,
    pub overdue: u64,
    pub upcoming_24h: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatsResponse {
    pub timestamp: DateTime<Utc>,
    pub running: bool,
    pub stats: DueStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessNowResponse {
    pub success: bool,
    pub processed_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueResponse {
    pub count: usize,
    pub posts: Vec<PostResponse>,
}
