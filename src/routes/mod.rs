use actix_web::web;

pub mod time_off_balances;
pub mod time_off_requests;
pub mod time_off_types;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(time_off_types::configure)
            .configure(time_off_requests::configure)
            .configure(time_off_balances::configure),
    );
}
