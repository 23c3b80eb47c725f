use anyhow::Result;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::env;
use tracing::{info, warn};

/// MinIO-backed snapshot store. One raw feed HTML object per completed visit,
/// keyed by task id, for offline selector debugging.
#[derive(Clone)]
pub struct StorageManager {
    client: Client,
    bucket: String,
}

impl StorageManager {
    pub async fn new() -> Result<Self> {
        let endpoint = env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key = env::var("MINIO_ROOT_USER").unwrap_or_else(|_| "minio_user".to_string());
        let secret_key = env::var("MINIO_ROOT_PASSWORD").unwrap_or_else(|_| "minio_password".to_string());
        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "maps-crawler-snapshots".to_string());

        let region_provider = RegionProviderChain::default_provider().or_else(Region::new("us-east-1"));
        let config = aws_config::from_env()
            .region(region_provider)
            .endpoint_url(&endpoint)
            .credentials_provider(Credentials::new(access_key, secret_key, None, None, "static"))
            .load()
            .await;

        let client_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();
        let client = Client::from_conf(client_config);

        let manager = Self { client, bucket };
        manager.ensure_bucket().await?;
        Ok(manager)
    }

    async fn ensure_bucket(&self) -> Result<()> {
        let mut attempts = 0;
        loop {
            match self.client.head_bucket().bucket(&self.bucket).send().await {
                Ok(_) => {
                    info!("✅ MinIO bucket '{}' ready", self.bucket);
                    return Ok(());
                }
                Err(e) => {
                    let is_not_found = e.into_service_error().is_not_found();

                    if is_not_found {
                        warn!("MinIO bucket '{}' missing, creating...", self.bucket);
                        match self.client.create_bucket().bucket(&self.bucket).send().await {
                            Ok(_) => {
                                info!("✅ Created MinIO bucket '{}'", self.bucket);
                                return Ok(());
                            }
                            Err(create_err) => {
                                warn!("Bucket create failed, retrying: {}", create_err);
                            }
                        }
                    } else {
                        // Connection-level failure; MinIO may still be coming up.
                        attempts += 1;
                        if attempts >= 15 {
                            return Err(anyhow::anyhow!(
                                "failed to reach MinIO after {} attempts",
                                attempts
                            ));
                        }
                        warn!("MinIO unreachable (attempt {}/15), retrying in 2s...", attempts);
                        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                    }
                }
            }
        }
    }

    pub async fn store_html(&self, key: &str, content: &str) -> Result<()> {
        let body = ByteStream::from(content.as_bytes().to_vec());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type("text/html")
            .send()
            .await?;
        Ok(())
    }
}
