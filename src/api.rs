use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::extract::Listing;
use crate::maps::SearchTarget;
use crate::queue::{QueueManager, ScrapeJob};
use crate::storage::StorageManager;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub storage: StorageManager,
    pub queue: QueueManager,
}

#[derive(Deserialize, ToSchema)]
pub struct ScrapeRequest {
    pub search_query: String,
    pub location: String,
    /// Listings to collect, default 20.
    pub max_results: Option<u32>,
    /// Accepted and stored; reserved for a reviews sub-extraction.
    pub include_reviews: Option<bool>,
    /// IETF language tag for the results page, default "en".
    pub language: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ScrapeResponse {
    pub task_id: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct TaskResult {
    pub id: String,
    pub search_query: String,
    pub location: String,
    pub status: String,
    pub listing_count: Option<i32>,
    pub error: Option<String>,
    pub listings: Vec<Listing>,
}

#[derive(Serialize, ToSchema)]
pub struct TaskSummary {
    pub id: String,
    pub search_query: String,
    pub location: String,
    pub status: String,
    pub listing_count: Option<i32>,
    pub created_at: Option<chrono::NaiveDateTime>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

fn bad_request(message: &str) -> ApiFailure {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> ApiFailure {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            error: e.to_string(),
        }),
    )
}

/// Queue a map-search scrape. Missing search parameters fail here, before
/// anything is queued or navigated.
#[utoipa::path(
    post,
    path = "/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Scrape queued", body = ScrapeResponse),
        (status = 400, description = "Missing search parameters", body = ApiError),
        (status = 500, description = "Queue or database failure", body = ApiError)
    ),
    tag = "scraper"
)]
pub async fn trigger_scrape(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, ApiFailure> {
    if payload.search_query.trim().is_empty() || payload.location.trim().is_empty() {
        return Err(bad_request("search_query and location are required"));
    }

    let target = SearchTarget {
        search_query: payload.search_query.trim().to_string(),
        location: payload.location.trim().to_string(),
        max_results: payload.max_results.unwrap_or(20).max(1) as usize,
        include_reviews: payload.include_reviews.unwrap_or(false),
        language: payload.language.unwrap_or_else(|| "en".to_string()),
    };
    let task_id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO tasks (id, search_query, location, max_results, include_reviews, language, status)
         VALUES ($1, $2, $3, $4, $5, $6, 'queued')",
    )
    .bind(&task_id)
    .bind(&target.search_query)
    .bind(&target.location)
    .bind(target.max_results as i32)
    .bind(target.include_reviews)
    .bind(&target.language)
    .execute(&state.pool)
    .await
    .map_err(internal)?;

    state
        .queue
        .push_job(ScrapeJob {
            id: task_id.clone(),
            target,
        })
        .await
        .map_err(internal)?;

    info!("📥 Queued scrape task {}", task_id);
    Ok(Json(ScrapeResponse {
        task_id,
        message: "Scrape queued".to_string(),
    }))
}

/// Fetch one task with its extracted listings.
#[utoipa::path(
    get,
    path = "/scrape/{task_id}",
    params(("task_id" = String, Path, description = "Task id returned by POST /scrape")),
    responses(
        (status = 200, description = "Task detail", body = TaskResult),
        (status = 404, description = "Unknown task", body = ApiError)
    ),
    tag = "scraper"
)]
pub async fn get_scrape_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResult>, ApiFailure> {
    let row = sqlx::query(
        "SELECT id, search_query, location, status, listing_count, error, results_json
         FROM tasks WHERE id = $1",
    )
    .bind(&task_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(internal)?
    .ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("task {} not found", task_id),
            }),
        )
    })?;

    let listings: Vec<Listing> = row
        .get::<Option<String>, _>("results_json")
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();

    Ok(Json(TaskResult {
        id: row.get("id"),
        search_query: row.get("search_query"),
        location: row.get("location"),
        status: row.get("status"),
        listing_count: row.get("listing_count"),
        error: row.get("error"),
        listings,
    }))
}

/// List recent tasks, newest first.
#[utoipa::path(
    get,
    path = "/tasks",
    responses(
        (status = 200, description = "Recent tasks", body = [TaskSummary])
    ),
    tag = "scraper"
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TaskSummary>>, ApiFailure> {
    let rows = sqlx::query(
        "SELECT id, search_query, location, status, listing_count, created_at
         FROM tasks ORDER BY created_at DESC LIMIT 50",
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal)?;

    let tasks = rows
        .into_iter()
        .map(|row| TaskSummary {
            id: row.get("id"),
            search_query: row.get("search_query"),
            location: row.get("location"),
            status: row.get("status"),
            listing_count: row.get("listing_count"),
            created_at: row.get("created_at"),
        })
        .collect();

    Ok(Json(tasks))
}
