use anyhow::Result;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::extract::Listing;
use crate::maps;
use crate::queue::ScrapeJob;

/// The extractor may find more items than requested; the cap applies at
/// emission time.
fn cap_listings(mut listings: Vec<Listing>, max_results: usize) -> Vec<Listing> {
    listings.truncate(max_results);
    listings
}

pub async fn start_worker(state: Arc<AppState>) {
    info!("👷 Worker started, polling Redis...");

    loop {
        match state.queue.pop_job().await {
            Ok(Some(job)) => {
                info!(
                    "👷 [Worker] Picked up task {} ({} in {})",
                    job.id, job.target.search_query, job.target.location
                );
                if let Err(e) = process_job(state.clone(), job).await {
                    error!("❌ [Worker] Task failed: {:#}", e);
                }
            }
            Ok(None) => {
                // Queue empty, sleep backoff
                sleep(Duration::from_millis(1000)).await;
            }
            Err(e) => {
                error!("🔥 [Worker] Redis error: {}", e);
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn process_job(state: Arc<AppState>, job: ScrapeJob) -> Result<()> {
    let outcome = match maps::run_search(&job.target).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Failure channel: target URL + error; no partial-page records.
            let url = maps::build_search_url(&job.target);
            error!("❌ [Worker] Visit failed for {}: {:#}", url, e);
            sqlx::query("UPDATE tasks SET status = 'failed', search_url = $2, error = $3 WHERE id = $1")
                .bind(&job.id)
                .bind(&url)
                .bind(format!("{:#}", e))
                .execute(&state.pool)
                .await?;
            return Err(e);
        }
    };

    // Emission cap lives here, not in the extractor.
    let listings = cap_listings(outcome.listings, job.target.max_results);

    // Raw feed snapshot to MinIO; losing it is not worth failing the task.
    let s3_key = format!("{}.html", job.id);
    if let Err(e) = state.storage.store_html(&s3_key, &outcome.feed_html).await {
        warn!("⚠️ [Worker] MinIO upload failed: {}", e);
    } else {
        info!("💾 [Worker] Feed snapshot saved to MinIO: {}", s3_key);
    }

    for listing in &listings {
        sqlx::query(
            "INSERT INTO listings (task_id, name, rating, review_count, category, address, place_url, latitude, longitude, scraped_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&job.id)
        .bind(&listing.name)
        .bind(&listing.rating)
        .bind(&listing.review_count)
        .bind(&listing.category)
        .bind(&listing.address)
        .bind(&listing.place_url)
        .bind(&listing.latitude)
        .bind(&listing.longitude)
        .bind(listing.scraped_at)
        .execute(&state.pool)
        .await?;
    }

    let results_json = serde_json::to_string(&listings).unwrap_or_default();
    sqlx::query(
        "UPDATE tasks SET status = 'completed', search_url = $2, results_json = $3, listing_count = $4 WHERE id = $1",
    )
    .bind(&job.id)
    .bind(&outcome.url)
    .bind(&results_json)
    .bind(listings.len() as i32)
    .execute(&state.pool)
    .await?;

    info!(
        "✅ [Worker] Task {} completed with {} listings",
        job.id,
        listings.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn listing(name: &str) -> Listing {
        Listing {
            name: name.to_string(),
            rating: None,
            review_count: None,
            category: None,
            address: None,
            place_url: None,
            latitude: None,
            longitude: None,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn emission_never_exceeds_max_results() {
        let listings: Vec<Listing> = (0..30).map(|i| listing(&format!("Place {}", i))).collect();
        let capped = cap_listings(listings, 20);
        assert_eq!(capped.len(), 20);
        assert_eq!(capped[0].name, "Place 0");
    }

    #[test]
    fn short_batches_pass_through() {
        let listings = vec![listing("A"), listing("B")];
        assert_eq!(cap_listings(listings, 20).len(), 2);
    }
}
