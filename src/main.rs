mod api;
mod browser;
mod db;
mod extract;
mod maps;
mod parse;
mod queue;
mod scheduler;
mod scroll;
mod storage;
mod worker;

use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(api::trigger_scrape, api::get_scrape_status, api::list_tasks),
    components(
        schemas(
            api::ScrapeRequest,
            api::ScrapeResponse,
            api::ApiError,
            api::TaskResult,
            api::TaskSummary,
            crate::extract::Listing
        )
    ),
    tags(
        (name = "scraper", description = "Map search scraping API")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // Robust Connection Retry Loop
    info!("🔌 Connecting to database...");
    let pool = {
        let mut attempts = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .connect(&db_url)
                .await
            {
                Ok(p) => {
                    info!("✅ Database connected");
                    break p;
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= 15 {
                        error!("🔥 CRITICAL: failed to connect to DB after 15 attempts");
                        return Err(e.into());
                    }
                    warn!("⚠️ DB connect failed ({}), retrying in 2s... (attempt {}/15)", e, attempts);
                    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                }
            }
        }
    };

    db::init_db(&pool).await?;

    let storage = storage::StorageManager::new().await.expect("Failed to init MinIO");
    let queue = queue::QueueManager::new().await.expect("Failed to init Redis");

    let state = Arc::new(api::AppState { pool, storage, queue });

    // Background worker: pops scrape jobs and drives the browser
    let worker_state = state.clone();
    tokio::spawn(async move {
        worker::start_worker(worker_state).await;
    });

    // Recurring jobs (heartbeat + optional scheduled scrape)
    let scheduler_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler::start_scheduler(scheduler_state).await {
            error!("🔥 Scheduler error: {}", e);
        }
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/maps-crawler-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/scrape", post(api::trigger_scrape))
        .route("/scrape/:task_id", get(api::get_scrape_status))
        .route("/tasks", get(api::list_tasks))
        .nest_service("/", ServeDir::new("static")) // Serve dashboard
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
