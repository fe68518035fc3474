use actix_web::web;

use crate::handlers::time_off_types;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/time-off-types")
            .route("", web::get().to(time_off_types::list_types))
            .route("", web::post().to(time_off_types::create_type))
            .route("/{id}", web::get().to(time_off_types::get_type))
            .route("/{id}", web::put().to(time_off_types::update_type))
            .route("/{id}", web::delete().to(time_off_types::deactivate_type)),
    );
}
