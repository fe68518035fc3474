use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, web};
use anyhow::Result;

use leave::database::{PgLeaveStore, init_database};
use leave::middleware::RequestIdMiddleware;
use leave::services::calendar;
use leave::{AppState, Config, routes};

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    env_logger::init();

    log::info!(
        "Starting time-off service (environment: {})",
        config.environment
    );

    let pool = init_database(&config).await?;
    let store = Arc::new(PgLeaveStore::new(pool, config.lock_timeout()));
    let calendar = calendar::from_config(&config.calendar)?;

    let app_state = web::Data::new(AppState::new(store.clone(), store, calendar));
    let config_data = web::Data::new(config.clone());

    let server_address = config.server_address();
    log::info!("Server starting on http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(config_data.clone())
            .wrap(
                Cors::default()
                    .allowed_origin("http://localhost:3000")
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        "Authorization",
                        "Content-Type",
                        "Accept",
                        "X-Correlation-ID",
                    ])
                    .expose_headers(vec!["X-Correlation-ID", "Retry-After"])
                    .max_age(3600),
            )
            .wrap(RequestIdMiddleware)
            .wrap(Logger::new(
                r#"%a "%r" %s %b %T correlation_id=%{x-correlation-id}o"#,
            ))
            .service(health)
            .configure(routes::configure)
    })
    .bind(&server_address)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
