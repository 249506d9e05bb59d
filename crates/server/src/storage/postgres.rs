//! Relational adapter backed by PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrod_core::{MetricId, MetricKind, MetricSample};
use sqlx::Row as _;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use super::{Storage, StorageError};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS metrics (
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    delta       BIGINT,
    value       DOUBLE PRECISION,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (name, kind)
)";

const UPSERT: &str = "\
INSERT INTO metrics (name, kind, delta, value, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (name, kind) DO UPDATE
SET delta = EXCLUDED.delta, value = EXCLUDED.value, updated_at = EXCLUDED.updated_at";

const SELECT_ONE: &str = "\
SELECT name, kind, delta, value, created_at, updated_at
FROM metrics WHERE name = $1 AND kind = $2";

const SELECT_ALL: &str = "\
SELECT name, kind, delta, value, created_at, updated_at FROM metrics";

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect and ensure the metrics table exists.
    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().max_connections(8).connect(dsn).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn sample_from_row(row: &PgRow) -> Result<MetricSample, StorageError> {
    let name: String = row.try_get("name")?;
    let kind: String = row.try_get("kind")?;
    let kind: MetricKind = kind
        .parse()
        .map_err(|_| StorageError::Corrupt(format!("unknown kind {kind:?} for {name:?}")))?;
    let delta: Option<i64> = row.try_get("delta")?;
    let value: Option<f64> = row.try_get("value")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(MetricSample {
        name,
        kind,
        delta,
        value,
        created_at: Some(created_at),
        updated_at: Some(updated_at),
    })
}

#[async_trait]
impl Storage for PgStorage {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError> {
        // created_at is preserved on conflict; the service stamps both
        // timestamps before save.
        sqlx::query(UPSERT)
            .bind(&sample.name)
            .bind(sample.kind.as_str())
            .bind(sample.delta)
            .bind(sample.value)
            .bind(sample.created_at.unwrap_or_else(Utc::now))
            .bind(sample.updated_at.unwrap_or_else(Utc::now))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &MetricId) -> Result<Option<MetricSample>, StorageError> {
        let row = sqlx::query(SELECT_ONE)
            .bind(&id.name)
            .bind(id.kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(sample_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<MetricSample>, StorageError> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;
        rows.iter().map(sample_from_row).collect()
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
