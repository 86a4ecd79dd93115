#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod forms;
mod models;
mod routes;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{api_get_subject_questions, api_get_subjects, api_me, health, not_found_api};
use auth::{
    forbidden, login, logout, not_found, process_login, process_register, register, unauthorized,
    unauthorized_api,
};
use db::{clean_expired_sessions, ensure_admin};
use env::{AppConfig, load_environment};
use error::AppError;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use routes::{
    questions_create, questions_delete, questions_edit, questions_form, questions_index,
    questions_question, subjects_add_owner, subjects_create, subjects_delete, subjects_edit,
    subjects_edit_form, subjects_form, subjects_index,
};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

#[launch]
async fn rocket() -> _ {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    let telemetry_guard = init_tracing();

    match setup().await {
        Ok(rocket) => rocket.manage(telemetry_guard),
        Err(e) => {
            error!("Failed to start study tracker: {}", e);
            panic!("Startup failed: {}", e);
        }
    }
}

async fn setup() -> Result<Rocket<Build>, Error> {
    let config = AppConfig::load()?;

    let pool = SqlitePoolOptions::new()
        .connect(&config.database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    if let Some((username, password)) = config.bootstrap_admin() {
        ensure_admin(&pool, username, password).await?;
        info!(username = %username, "Admin account ready");
    }

    spawn_session_cleanup(pool.clone(), config.session_cleanup_secs);

    Ok(init_rocket(pool, config).await)
}

fn spawn_session_cleanup(pool: SqlitePool, interval_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
        }
    });
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting study tracker");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/",
            routes![
                subjects_index,
                subjects_form,
                subjects_create,
                subjects_edit_form,
                subjects_edit,
                subjects_add_owner,
                subjects_delete,
                questions_index,
                questions_form,
                questions_question,
                questions_edit,
                questions_delete,
                questions_create,
            ],
        )
        .mount(
            "/auth",
            routes![login, process_login, logout, register, process_register],
        )
        .mount(
            "/api",
            routes![health, api_me, api_get_subjects, api_get_subject_questions],
        )
        .register("/", catchers![unauthorized, forbidden, not_found])
        .register("/api", catchers![unauthorized_api, not_found_api])
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
