use anyhow::Result;
use sqlx::postgres::PgPool;

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id VARCHAR PRIMARY KEY,
            search_query VARCHAR NOT NULL,
            location VARCHAR NOT NULL,
            max_results INT NOT NULL DEFAULT 20,
            include_reviews BOOLEAN NOT NULL DEFAULT FALSE,
            language VARCHAR NOT NULL DEFAULT 'en',
            status VARCHAR NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            search_url TEXT,
            results_json TEXT,
            listing_count INT,
            error TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            id SERIAL PRIMARY KEY,
            task_id VARCHAR NOT NULL REFERENCES tasks(id),
            name VARCHAR NOT NULL,
            rating VARCHAR,
            review_count VARCHAR,
            category VARCHAR,
            address VARCHAR,
            place_url TEXT,
            latitude VARCHAR,
            longitude VARCHAR,
            scraped_at TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
