//! HTTP handlers and route configuration.

mod admin;
mod health;
mod posts;


use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Post routes
            .service(
                web::scope("/posts")
                    .route("", web::post().to(posts::create_post))
                    .route("", web::get().to(posts::list_posts))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}", web::put().to(posts::update_post))
                    .route("/{id}", web::delete().to(posts::delete_post))
                    .route("/{id}/schedule", web::post().to(posts::schedule_post))
                    .route("/{id}/unschedule", web::post().to(posts::unschedule_post)),
            )
            // Admin routes
            .service(
                web::scope("/admin")
                    .route("/scheduler/stats", web::get().to(admin::scheduler_stats))
                    .route("/scheduler/process-now", web::post().to(admin::process_now))
                    .route("/posts/overdue", web::get().to(admin::overdue_posts)),
            ),
    );
}
