// src/api/routes.rs
use actix_web::web;
use super::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/scan")
                    .route(web::post().to(handlers::submit_scan))
                    .default_service(web::route().to(handlers::method_not_allowed))
            )
            .service(
                web::scope("/analyses")
                    .route("/{id}", web::get().to(handlers::get_analysis))
                    .route("/{id}/verdict", web::get().to(handlers::get_verdict))
            )
            .route("/v1/health", web::get().to(handlers::health_check))
    );
}
