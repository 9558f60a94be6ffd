//! Post handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use cadence_core::DomainError;
use cadence_core::domain::{Post, PostStatus};
use cadence_core::error::RepoError;
use cadence_core::ports::{BaseRepository, PostFilter};
use cadence_core::services::{PostEdit, ScheduleChange};
use cadence_shared::dto::{
    CreatePostRequest, ListPostsQuery, PostResponse, ScheduleRequest, ScheduleResponse,
    UpdatePostRequest,
};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const MAX_TITLE_CHARS: usize = 500;

pub(crate) fn post_response(post: Post) -> PostResponse {
    PostResponse {
        id: post.id,
        user_id: post.user_id,
        title: post.title,
        content: post.content,
        status: post.status.to_string(),
        scheduled_for: post.scheduled_for,
        published_at: post.published_at,
        external_post_id: post.external_post_id,
        error_message: post.error_message,
        publish_attempts: post.publish_attempts,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

/// Load a post the caller is allowed to manage.
async fn load_managed(state: &AppState, identity: &Identity, id: Uuid) -> AppResult<Post> {
    let post = state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::post_not_found(id))?;
    identity.actor.ensure_can_manage(&post)?;
    Ok(post)
}

fn validate_title(title: &str) -> AppResult<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        return Err(AppError::invalid_input(format!(
            "Title must be between 1 and {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::invalid_input("Content must not be empty"));
    }
    Ok(())
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    validate_title(&req.title)?;
    validate_content(&req.content)?;

    let post = Post::new(identity.actor.user_id, req.title, req.content);
    let saved = state.posts.insert(post).await?;
    tracing::info!(post_id = %saved.id, user_id = %saved.user_id, "Post created");

    let Some(at) = req.scheduled_for else {
        return Ok(HttpResponse::Created().json(post_response(saved)));
    };

    match state.scheduling.schedule_at(saved.id, at).await {
        Ok(scheduled) => Ok(HttpResponse::Created().json(post_response(scheduled))),
        Err(e) => {
            if let Err(cleanup) = state.posts.delete(saved.id).await {
                tracing::warn!(post_id = %saved.id, error = %cleanup, "Failed to remove post after scheduling error");
            }
            Err(e.into())
        }
    }
}

/// GET /api/posts
pub async fn list_posts(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<ListPostsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();

    let status = query
        .status
        .as_deref()
        .map(str::parse::<PostStatus>)
        .transpose()?;

    let user_id = if identity.actor.is_admin() {
        query.user_id
    } else {
        match query.user_id {
            Some(other) if other != identity.actor.user_id => return Err(AppError::Forbidden),
            _ => Some(identity.actor.user_id),
        }
    };

    let mut filter = PostFilter {
        user_id,
        status,
        created_from: query.start_date,
        created_until: query.end_date,
        ..PostFilter::default()
    };
    if status == Some(PostStatus::Scheduled) {
        let now = state.clock.now();
        match query.upcoming_only {
            Some(true) => filter.scheduled_after = Some(now),
            Some(false) => filter.scheduled_until = Some(now),
            None => {}
        }
    }

    let posts = state.posts.find_by_filter(filter).await?;

    let body: Vec<PostResponse> = posts.into_iter().map(post_response).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/posts/{id}
pub async fn get_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = load_managed(&state, &identity, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post_response(post)))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = load_managed(&state, &identity, path.into_inner()).await?;

    state
        .posts
        .delete_unclaimed(post.id, state.clock.now())
        .await
        .map_err(|e| match e {
            RepoError::Conflict(_) => DomainError::PublishInProgress(post.id),
            RepoError::NotFound => DomainError::post_not_found(post.id),
            other => other.into(),
        })?;
    tracing::info!(post_id = %post.id, "Post deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let req = body.into_inner();
    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if let Some(content) = &req.content {
        validate_content(content)?;
    }
    load_managed(&state, &identity, id).await?;

    let edit = PostEdit {
        title: req.title,
        content: req.content,
        schedule: req.scheduled_for.map(|at| match at {
            Some(at) => ScheduleChange::At(at),
            None => ScheduleChange::Clear,
        }),
    };
    let post = state.scheduling.edit(id, edit).await?;
    Ok(HttpResponse::Ok().json(post_response(post)))
}

/// POST /api/posts/{id}/schedule
pub async fn schedule_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<ScheduleRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_managed(&state, &identity, id).await?;

    let req = body.into_inner();
    let post = state
        .scheduling
        .schedule(id, &req.date, req.hour, req.minute)
        .await?;

    let message = match post.scheduled_for {
        Some(at) => format!("Post scheduled for {}", at.format("%Y-%m-%d %H:%M")),
        None => "Post scheduled".to_string(),
    };
    Ok(HttpResponse::Ok().json(ScheduleResponse {
        success: true,
        message,
        post: post_response(post),
    }))
}

/// POST /api/posts/{id}/unschedule
pub async fn unschedule_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_managed(&state, &identity, id).await?;

    let post = state.scheduling.unschedule(id).await?;

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        success: true,
        message: "Post unscheduled successfully".to_string(),
        post: post_response(post),
    }))
}
