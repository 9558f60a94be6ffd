//! Admin-only scheduler endpoints.

use actix_web::{HttpResponse, web};

use cadence_shared::dto::{DueStats, OverdueResponse, ProcessNowResponse, SchedulerStatsResponse};

use super::posts::post_response;
use crate::middleware::auth::AdminIdentity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/admin/scheduler/stats
pub async fn scheduler_stats(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
) -> AppResult<HttpResponse> {
    let stats = state.scheduling.due_stats().await?;

    Ok(HttpResponse::Ok().json(SchedulerStatsResponse {
        timestamp: state.clock.now(),
        running: state.scheduler.is_running().await,
        stats: DueStats {
            total_scheduled: stats.total_scheduled,
            overdue: stats.overdue,
            upcoming_24h: stats.upcoming_24h,
        },
    }))
}

/// POST /api/admin/scheduler/process-now
pub async fn process_now(
    state: web::Data<AppState>,
    admin: AdminIdentity,
) -> AppResult<HttpResponse> {
    tracing::info!(user_id = %admin.0.actor.user_id, "Manual processing requested");

    let report = state
        .scheduler
        .trigger_now()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let message = if report.committed {
        format!("Successfully processed {} posts", report.processed)
    } else {
        "Sweep rolled back, posts will be retried".to_string()
    };

    Ok(HttpResponse::Ok().json(ProcessNowResponse {
        success: report.committed,
        processed_count: report.processed,
        message,
    }))
}

/// GET /api/admin/posts/overdue
pub async fn overdue_posts(
    state: web::Data<AppState>,
    _admin: AdminIdentity,
) -> AppResult<HttpResponse> {
    let posts = state.scheduling.overdue().await?;

    Ok(HttpResponse::Ok().json(OverdueResponse {
        count: posts.len(),
        posts: posts.into_iter().map(post_response).collect(),
    }))
}
