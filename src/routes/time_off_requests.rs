use actix_web::web;

use crate::handlers::time_off_requests;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Literal segments are registered before "/{id}" so they are not parsed as ids.
    cfg.service(
        web::scope("/time-off-requests")
            .route("", web::post().to(time_off_requests::create_request))
            .route("", web::get().to(time_off_requests::list_all_requests))
            .route("/me", web::get().to(time_off_requests::list_my_requests))
            .route("/team", web::get().to(time_off_requests::list_team_requests))
            .route("/calendar", web::get().to(time_off_requests::team_calendar))
            .route("/{id}", web::get().to(time_off_requests::get_request))
            .route(
                "/{id}/review",
                web::put().to(time_off_requests::review_request),
            )
            .route(
                "/{id}/cancel",
                web::put().to(time_off_requests::cancel_request),
            ),
    );
}
