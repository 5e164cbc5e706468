//! Route configuration
//!
//! Public reads stay outside the JWT-wrapped scope; every mutation and the
//! join/leave protocol require an authenticated caller.

use actix_web::web;

use crate::handlers;
use crate::metrics;
use crate::middleware::JwtAuthMiddleware;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics::serve_metrics))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(handlers::health_check))
                .configure(streams),
        );
}

fn streams(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/streams")
            .route("/{id}", web::get().to(handlers::get_stream))
            .service(
                web::scope("")
                    .wrap(JwtAuthMiddleware)
                    .route("", web::post().to(handlers::create_stream))
                    .route("/{id}", web::patch().to(handlers::update_stream))
                    .route("/{id}", web::delete().to(handlers::delete_stream))
                    .route("/{id}/start", web::post().to(handlers::start_stream))
                    .route("/{id}/end", web::post().to(handlers::end_stream))
                    .route("/{id}/join", web::post().to(handlers::join_stream))
                    .route("/{id}/leave", web::post().to(handlers::leave_stream)),
            ),
    );
}
