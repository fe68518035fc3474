use anyhow::Result;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::Config;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;
pub mod utils;

pub use memory::MemoryStore;
pub use postgres::PgLeaveStore;
pub use store::{EmployeeDirectory, LeaveStore, StoreTx};

pub async fn init_database(config: &Config) -> Result<PgPool> {
    log::info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations completed successfully");

    Ok(pool)
}
