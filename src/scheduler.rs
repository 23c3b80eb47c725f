use std::env;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::AppState;
use crate::maps::SearchTarget;
use crate::queue::ScrapeJob;

pub async fn start_scheduler(state: Arc<AppState>) -> anyhow::Result<()> {
    let sched = JobScheduler::new().await?;

    // Heartbeat (every 5 minutes)
    sched
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("⏰ [Scheduler] Heartbeat: scheduler active");
            })
        })?)
        .await?;

    // Optional recurring scrape, driven entirely by env. Daily at midnight
    // unless SCHEDULED_CRON overrides.
    if let (Ok(query), Ok(location)) = (env::var("SCHEDULED_QUERY"), env::var("SCHEDULED_LOCATION")) {
        let schedule = env::var("SCHEDULED_CRON").unwrap_or_else(|_| "0 0 0 * * *".to_string());
        info!(
            "⏰ [Scheduler] Recurring scrape registered: '{}' in '{}' ({})",
            query, location, schedule
        );

        let state_clone = state.clone();
        sched
            .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
                let state = state_clone.clone();
                let query = query.clone();
                let location = location.clone();
                Box::pin(async move {
                    let target = SearchTarget {
                        search_query: query,
                        location,
                        max_results: 20,
                        include_reviews: false,
                        language: "en".to_string(),
                    };
                    let job = ScrapeJob {
                        id: Uuid::new_v4().to_string(),
                        target,
                    };

                    let inserted = sqlx::query(
                        "INSERT INTO tasks (id, search_query, location, max_results, include_reviews, language, status)
                         VALUES ($1, $2, $3, $4, $5, $6, 'queued')",
                    )
                    .bind(&job.id)
                    .bind(&job.target.search_query)
                    .bind(&job.target.location)
                    .bind(job.target.max_results as i32)
                    .bind(job.target.include_reviews)
                    .bind(&job.target.language)
                    .execute(&state.pool)
                    .await;

                    if let Err(e) = inserted {
                        error!("❌ [Scheduler] Failed to record scheduled task: {}", e);
                        return;
                    }

                    match state.queue.push_job(job).await {
                        Ok(()) => info!("✅ [Scheduler] Scheduled scrape queued"),
                        Err(e) => error!("❌ [Scheduler] Failed to queue scheduled scrape: {}", e),
                    }
                })
            })?)
            .await?;
    }

    sched.start().await?;
    info!("✅ Scheduler started");

    Ok(())
}
