use actix_web::web;

use crate::handlers::time_off_balances;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/time-off-balances")
            .route("/me", web::get().to(time_off_balances::my_balances))
            .route(
                "/employees/{id}",
                web::get().to(time_off_balances::employee_balances),
            )
            .route(
                "/employees/{id}/types/{type_id}/adjust",
                web::put().to(time_off_balances::adjust_balance),
            )
            .route(
                "/employees/{id}/initialize",
                web::post().to(time_off_balances::initialize_balances),
            ),
    );
}
