#[macro_use]
extern crate rocket;

mod api;
mod env;
mod error;
mod models;
mod planner;
mod schedule;
mod stats;
mod store;
mod sync;
mod telemetry;
#[cfg(test)]
mod test;
mod timer;
mod validation;

use std::sync::Mutex;

use once_cell::sync::Lazy;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing};
use timer::StopwatchRegistry;
use tracing::{error, info};

use api::{
    api_create_session, api_create_subject, api_create_task, api_create_test,
    api_cycle_task_status, api_delete_subject, api_delete_task, api_delete_test,
    api_generate_plan, api_get_state, api_get_stats, api_get_stopwatch, api_get_tasks,
    api_log_stopwatch, api_pause_stopwatch, api_reset_stopwatch, api_start_stopwatch,
    api_toggle_task_day, api_toggle_topic, api_update_subject, health, not_found, unprocessable,
};

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:exam_tracker.db?mode=rwc".to_string());

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting exam tracker");

    rocket::build()
        .manage(pool)
        .manage(StopwatchRegistry::default())
        .manage(reqwest::Client::new())
        .mount(
            "/api",
            routes![
                health,
                api_get_state,
                api_create_subject,
                api_update_subject,
                api_delete_subject,
                api_toggle_topic,
                api_get_tasks,
                api_create_task,
                api_cycle_task_status,
                api_toggle_task_day,
                api_delete_task,
                api_create_test,
                api_delete_test,
                api_create_session,
                api_get_stats,
                api_get_stopwatch,
                api_start_stopwatch,
                api_pause_stopwatch,
                api_reset_stopwatch,
                api_log_stopwatch,
                api_generate_plan,
            ],
        )
        .register("/api", catchers![not_found, unprocessable])
        .attach(TelemetryFairing)
}
