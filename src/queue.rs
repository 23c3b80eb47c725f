use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use crate::maps::SearchTarget;

const QUEUE_KEY: &str = "scrape_queue";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScrapeJob {
    pub id: String,
    pub target: SearchTarget,
}

#[derive(Clone)]
pub struct QueueManager {
    client: Client,
}

impl QueueManager {
    pub async fn new() -> Result<Self> {
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = Client::open(redis_url)?;

        // Test connection
        let mut conn = client.get_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("✅ Redis connected");

        Ok(Self { client })
    }

    pub async fn push_job(&self, job: ScrapeJob) -> Result<()> {
        let mut conn = self.client.get_async_connection().await?;
        let job_json = serde_json::to_string(&job)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, job_json).await?;
        Ok(())
    }

    pub async fn pop_job(&self) -> Result<Option<ScrapeJob>> {
        let mut conn = self.client.get_async_connection().await?;
        let result: Option<String> = conn.rpop(QUEUE_KEY, None).await?;

        match result {
            Some(json) => {
                let job: ScrapeJob = serde_json::from_str(&json)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }
}
